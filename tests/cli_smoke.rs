use std::{
    path::{Path, PathBuf},
    process::Command,
};

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_sheetplay")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "sheetplay.exe"
            } else {
                "sheetplay"
            });
            p
        })
}

fn write_sheet(dir: &Path) -> PathBuf {
    let mut img = image::RgbaImage::from_pixel(160, 160, image::Rgba([0, 0, 0, 255]));
    for i in 0..16u32 {
        let (cx, cy) = ((i % 4) * 40, (i / 4) * 40);
        for y in cy + 4..cy + 14 {
            for x in cx + 4 + i..cx + 14 + i {
                img.put_pixel(x, y, image::Rgba([240, 200, 80, 255]));
            }
        }
    }
    let path = dir.join("sheet.png");
    img.save(&path).unwrap();
    path
}

#[test]
fn cli_analyze_prints_registry_json() {
    let tmp = tempfile::tempdir().unwrap();
    let sheet = write_sheet(tmp.path());

    let output = Command::new(exe())
        .args(["analyze", "--layout", "grid-4x4", "--in"])
        .arg(&sheet)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["registry"]["frames"].as_array().unwrap().len(), 16);
    assert_eq!(json["registry"]["layout"], "grid-4x4");
    let stability = json["stability"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&stability));
}

#[test]
fn cli_frame_writes_png() {
    let tmp = tempfile::tempdir().unwrap();
    let sheet = write_sheet(tmp.path());
    let out = tmp.path().join("out").join("frame.png");

    let status = Command::new(exe())
        .args(["frame", "--progress", "0.5", "--in"])
        .arg(&sheet)
        .arg("--out")
        .arg(&out)
        .status()
        .unwrap();

    assert!(status.success());
    let img = image::open(&out).unwrap();
    assert_eq!((img.width(), img.height()), (512, 512));
}

#[test]
fn cli_rejects_unsupported_layout() {
    let tmp = tempfile::tempdir().unwrap();
    let sheet = write_sheet(tmp.path());

    let status = Command::new(exe())
        .args(["analyze", "--layout", "grid-3x3", "--in"])
        .arg(&sheet)
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn cli_export_png_sequence() {
    let tmp = tempfile::tempdir().unwrap();
    let sheet = write_sheet(tmp.path());
    let config = tmp.path().join("config.json");
    std::fs::write(
        &config,
        r#"{ "canvas": { "width": 64, "height": 64 }, "base_loop_ms": 500 }"#,
    )
    .unwrap();
    let out = tmp.path().join("frames");

    let status = Command::new(exe())
        .args(["export", "--format", "png", "--fps", "10", "--config"])
        .arg(&config)
        .arg("--in")
        .arg(&sheet)
        .arg("--out")
        .arg(&out)
        .status()
        .unwrap();

    assert!(status.success());
    let count = std::fs::read_dir(&out).unwrap().count();
    assert_eq!(count, 10);
}
