/// Face of the prop shown in the main window, unless `faceImage` points elsewhere.
pub const POISSON_FACE_BYTES: &[u8] = include_bytes!("../resources/poisson.png");
