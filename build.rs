extern crate image;
use std::{env, fs};
use std::path::PathBuf;

fn package_dir() -> String {
    env::var("CARGO_MANIFEST_DIR").expect("No CARGO_MANIFEST_DIR env var")
}

fn out_dir() -> String {
    env::var("OUT_DIR").expect("No OUT_DIR env var")
}

fn build_window_icon() {
    let out_dir = out_dir();
    let img_path: PathBuf = [package_dir().as_str(), "resources", "icon-32.png"].iter().collect();
    let out_path: PathBuf = [out_dir.as_str(), "icon-32-rgba"].iter().collect();

    println!("cargo:rerun-if-changed={}", img_path.to_string_lossy());

    let img = image::open(img_path).expect("Failed to read/decode icon-32.png");
    let rgba = img.to_rgba8().into_raw();
    fs::write(&out_path, rgba).expect("Failed to write icon-32-rgba");
}

fn main() {
    build_window_icon();
}
