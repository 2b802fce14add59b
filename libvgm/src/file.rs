use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    config::PatchConfig,
    error::VgmError,
    patch::{patch, PatchReport},
};

/// Patches the file at `input` and writes the result to `output`.
///
/// Nothing is written unless the whole patch succeeds. The output goes to a
/// temporary sibling first and is renamed into place, so an existing
/// `output` is never left half written.
pub fn patch_file(
    input: &Path,
    output: &Path,
    config: &PatchConfig,
) -> Result<PatchReport, VgmError> {
    let data = fs::read(input)?;
    let patched = patch(&data, config)?;

    write_replacing(output, &patched.bytes)?;

    Ok(patched.report)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_replacing(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = temp_path(path);

    let written = (|| -> std::io::Result<()> {
        let mut f = File::create(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        drop(f);

        #[cfg(windows)]
        {
            // Windows rename fails if destination exists.
            if path.exists() {
                fs::remove_file(path)?;
            }
        }

        fs::rename(&tmp_path, path)
    })();

    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }

    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::tests::build_vgm;

    #[test]
    fn test_patch_file_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("song.vgm");
        let output = dir.path().join("out.vgm");
        fs::write(&input, build_vgm(0x171, &[0xB3, 0x02, 0x00, 0x62, 0x66], None)).unwrap();

        let report = patch_file(&input, &output, &PatchConfig::default()).unwrap();

        assert_eq!(report.bytes_removed, 3);
        let written = fs::read(&output).unwrap();
        assert_eq!(written[0x40..], [0x62, 0x66]);
        assert!(!temp_path(&output).exists());
    }

    #[test]
    fn test_failed_patch_leaves_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.vgm");
        let output = dir.path().join("out.vgm");
        let mut data = build_vgm(0x171, &[0x66], None);
        data[0..4].copy_from_slice(b"Vgn ");
        fs::write(&input, &data).unwrap();
        fs::write(&output, b"previous").unwrap();

        assert!(matches!(
            patch_file(&input, &output, &PatchConfig::default()),
            Err(VgmError::InvalidFormat { .. })
        ));
        assert_eq!(fs::read(&output).unwrap(), b"previous");
    }

    #[test]
    fn test_failed_patch_creates_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("short.vgm");
        let output = dir.path().join("out.vgm");
        fs::write(&input, b"Vgm ").unwrap();

        assert!(patch_file(&input, &output, &PatchConfig::default()).is_err());
        assert!(!output.exists());
        assert!(!temp_path(&output).exists());
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = patch_file(
            &dir.path().join("missing.vgm"),
            &dir.path().join("out.vgm"),
            &PatchConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, VgmError::Io(_)));
    }
}
