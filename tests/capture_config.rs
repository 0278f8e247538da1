use std::sync::Mutex;

use tempfile::NamedTempFile;

use capture_annotate::config::CaptureConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "CAPTURE_CONFIG",
        "CAPTURE_NETWORK_URL",
        "CAPTURE_CAMERA_DEVICE",
        "CAPTURE_OUTPUT_DIR",
        "CAPTURE_BACKEND",
        "CAPTURE_MODEL_PATH",
        "CAPTURE_TARGET_FPS",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "video": { "width": 800, "height": 600, "target_fps": 15 },
            "camera": { "device": "/dev/video2" },
            "network": { "url": "http://10.0.0.7:8080/video" },
            "detector": { "backend": "tract", "model_path": "models/ssd.onnx" },
            "output": {
                "dir": "captures",
                "video_file": "clip.mjpeg",
                "report_file": "clip.txt",
                "jpeg_quality": 90,
                "preview_file": "live.jpg"
            }
        }"#,
    );

    std::env::set_var("CAPTURE_CONFIG", file.path());
    std::env::set_var("CAPTURE_NETWORK_URL", "https://cam.example/mjpeg");
    std::env::set_var("CAPTURE_TARGET_FPS", "5");
    std::env::set_var("CAPTURE_BACKEND", "scripted");

    let cfg = CaptureConfig::load().expect("load config");

    assert_eq!(cfg.video.width, 800);
    assert_eq!(cfg.video.height, 600);
    assert_eq!(cfg.video.target_fps, 5);
    assert_eq!(cfg.camera_device, "/dev/video2");
    assert_eq!(cfg.network_url, "https://cam.example/mjpeg");
    assert_eq!(cfg.detector.backend, "scripted");
    assert_eq!(
        cfg.detector.model_path.as_deref(),
        Some(std::path::Path::new("models/ssd.onnx"))
    );
    assert_eq!(cfg.output.dir, std::path::PathBuf::from("captures"));
    assert_eq!(cfg.output.video_file, "clip.mjpeg");
    assert_eq!(cfg.output.report_file, "clip.txt");
    assert_eq!(cfg.output.jpeg_quality, 90);
    assert_eq!(
        cfg.output.preview_file,
        Some(std::path::PathBuf::from("live.jpg"))
    );
    assert_eq!(cfg.camera_config().target_fps, 5);
    assert_eq!(cfg.network_config().url, "https://cam.example/mjpeg");

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = CaptureConfig::load().expect("load defaults");
    assert_eq!(cfg.network_url, "http://192.168.1.3:8080/video");
    assert_eq!(cfg.camera_device, "/dev/video0");
    assert_eq!((cfg.video.width, cfg.video.height), (640, 480));
    assert_eq!(cfg.output.video_file, "recorded_video.mjpeg");
    assert_eq!(cfg.output.report_file, "recorded_data.txt");

    clear_env();
}

#[test]
fn rejects_invalid_settings() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CAPTURE_TARGET_FPS", "fast");
    assert!(CaptureConfig::load().is_err());
    clear_env();

    std::env::set_var("CAPTURE_NETWORK_URL", "rtsp://cam.example/stream");
    assert!(CaptureConfig::load().is_err());
    clear_env();

    let file = write_config(r#"{ "output": { "jpeg_quality": 0 } }"#);
    std::env::set_var("CAPTURE_CONFIG", file.path());
    assert!(CaptureConfig::load().is_err());
    clear_env();

    let file = write_config("{ not json");
    std::env::set_var("CAPTURE_CONFIG", file.path());
    assert!(CaptureConfig::load().is_err());
    clear_env();
}
