mod support;

use std::process::Command;

use support::peaks::write_peak_file;

fn peakwave(config_home: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_peakwave"));
    command.env("PEAKWAVE_CONFIG_HOME", config_home);
    command
}

#[test]
fn renders_tiles_and_composite() {
    let temp = tempfile::tempdir().unwrap();
    let peaks_path = temp.path().join("take.json");
    write_peak_file(&peaks_path, 500, 10.0);
    let out_dir = temp.path().join("out");

    let output = peakwave(&temp.path().join("config"))
        .arg("--peaks")
        .arg(&peaks_path)
        .arg("--out")
        .arg(&out_dir)
        .args(["--max-tile-width", "200", "--height", "48", "--restrict", "2:6"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // Ten seconds at the default 50 px/s is 500 px, split into three tiles.
    for name in ["take_tile00.png", "take_tile01.png", "take_tile02.png"] {
        assert!(out_dir.join(name).is_file(), "missing {name}");
    }
    let composite = image::open(out_dir.join("take.png")).unwrap();
    assert_eq!((composite.width(), composite.height()), (500, 48));
}

#[test]
fn out_of_range_restrict_is_adjusted_and_reported() {
    let temp = tempfile::tempdir().unwrap();
    let peaks_path = temp.path().join("take.json");
    write_peak_file(&peaks_path, 200, 4.0);

    let output = peakwave(&temp.path().join("config"))
        .arg("--peaks")
        .arg(&peaks_path)
        .arg("--out")
        .arg(temp.path().join("out"))
        .args(["--restrict", "1:9"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Adjusted --restrict"), "stderr: {stderr}");
}

#[test]
fn saved_region_is_reused_on_next_run() {
    let temp = tempfile::tempdir().unwrap();
    let config_home = temp.path().join("config");
    let peaks_path = temp.path().join("take.json");
    write_peak_file(&peaks_path, 300, 6.0);
    let out_dir = temp.path().join("out");

    let status = peakwave(&config_home)
        .arg("--peaks")
        .arg(&peaks_path)
        .arg("--out")
        .arg(&out_dir)
        .args(["--restrict", "1:3", "--mode", "trimmed", "--save-config"])
        .status()
        .unwrap();
    assert!(status.success());

    let settings_path = config_home.join(".peakwave").join("config.toml");
    let settings = peakwave::config::load_settings_from(&settings_path).unwrap();
    let record = settings.restrict.expect("restrict record saved");
    assert!(record.enabled);
    assert_eq!((record.start_time, record.end_time), (1.0, 3.0));

    let output = peakwave(&config_home)
        .arg("--peaks")
        .arg(&peaks_path)
        .arg("--out")
        .arg(&out_dir)
        .args(["--ticks", "--tick-spacing", "60"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    // Trimmed output is rebased so the first tick reads zero.
    assert!(
        stdout
            .lines()
            .any(|line| line.starts_with('*') && line.ends_with(" 0px 0:00.0"))
    );
}

#[test]
fn missing_peaks_flag_fails() {
    let temp = tempfile::tempdir().unwrap();
    let output = peakwave(temp.path()).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--peaks is required"));
}
