use reqwest_middleware::ClientWithMiddleware;

use crate::{config::Configuration, ffmpeg::FfMpeg, tmp_file::ArcTmpDir};

#[derive(Clone)]
pub(crate) struct State<S, T = FfMpeg> {
    pub(super) config: Configuration,
    pub(super) tmp_dir: ArcTmpDir,
    pub(super) store: S,
    pub(super) transcoder: T,
    pub(super) client: ClientWithMiddleware,
}
