/// Tests for the DoD 5220.22-M pass sequence and the block overwriter
///
/// Overwrite tests run against regular temp files standing in for a device node.

#[cfg(test)]
mod dod_algorithm_tests {
    use crate::algorithms::{BlockOverwriter, DoDWipe, Overwriter, PassPattern};
    use crate::WipeError;
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::sync::atomic::AtomicBool;
    use tempfile::NamedTempFile;

    fn device_file(size: usize, fill: u8) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(&vec![fill; size]).unwrap();
        file.flush().unwrap();
        file
    }

    fn read_back(file: &mut NamedTempFile) -> Vec<u8> {
        let mut contents = Vec::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut contents).unwrap();
        contents
    }

    fn path(file: &NamedTempFile) -> String {
        file.path().to_string_lossy().into_owned()
    }

    #[test]
    fn test_dod_sequence() {
        assert_eq!(DoDWipe::PASS_COUNT, 4);
        assert_eq!(
            DoDWipe::PASSES,
            [
                PassPattern::Random,
                PassPattern::Random,
                PassPattern::Random,
                PassPattern::Zero
            ]
        );
        assert_eq!(DoDWipe::STANDARD, "DoD 5220.22-M (3 passes + zero)");
    }

    #[test]
    fn test_pass_labels() {
        assert_eq!(DoDWipe::pass_label(1), "Pass 1/4: random data");
        assert_eq!(DoDWipe::pass_label(4), "Pass 4/4: zero fill");
        assert_eq!(DoDWipe::pass_label(0), "Pass 0/4");
    }

    #[test]
    fn test_zero_pass_clears_every_byte() {
        let mut file = device_file(10_000, 0xAA);
        let overwriter = BlockOverwriter::new(4096);
        let cancel = AtomicBool::new(false);

        let written = overwriter
            .write_pass(&path(&file), 10_000, PassPattern::Zero, &cancel, &mut |_| {})
            .unwrap();

        assert_eq!(written, 10_000);
        let contents = read_back(&mut file);
        assert_eq!(contents.len(), 10_000);
        assert!(contents.iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_random_pass_replaces_content() {
        let mut file = device_file(64 * 1024, 0x00);
        let overwriter = BlockOverwriter::new(8192);
        let cancel = AtomicBool::new(false);

        overwriter
            .write_pass(&path(&file), 64 * 1024, PassPattern::Random, &cancel, &mut |_| {})
            .unwrap();

        let contents = read_back(&mut file);
        assert_eq!(contents.len(), 64 * 1024);
        let zeros = contents.iter().filter(|&&b| b == 0).count();
        assert!(zeros < contents.len() / 16, "random pass left {} zero bytes", zeros);
    }

    #[test]
    fn test_progress_reports_cumulative_bytes() {
        let file = device_file(10_000, 0xFF);
        let overwriter = BlockOverwriter::new(4096);
        let cancel = AtomicBool::new(false);
        let mut seen = Vec::new();

        overwriter
            .write_pass(&path(&file), 10_000, PassPattern::Zero, &cancel, &mut |n| {
                seen.push(n)
            })
            .unwrap();

        assert_eq!(seen, vec![4096, 8192, 10_000]);
    }

    #[test]
    fn test_unknown_size_is_read_from_device() {
        let mut file = device_file(12_345, 0x55);
        let overwriter = BlockOverwriter::new(4096);
        let cancel = AtomicBool::new(false);

        let written = overwriter
            .write_pass(&path(&file), 0, PassPattern::Zero, &cancel, &mut |_| {})
            .unwrap();

        assert_eq!(written, 12_345);
        assert!(read_back(&mut file).iter().all(|&b| b == 0));
    }

    #[test]
    fn test_empty_device_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        let cancel = AtomicBool::new(false);

        let result = BlockOverwriter::default().write_pass(
            &path(&file),
            0,
            PassPattern::Zero,
            &cancel,
            &mut |_| {},
        );

        assert!(matches!(result, Err(WipeError::Io(_))));
    }

    #[test]
    fn test_cancel_stops_before_writing() {
        let mut file = device_file(8192, 0xAA);
        let cancel = AtomicBool::new(true);

        let result = BlockOverwriter::new(1024).write_pass(
            &path(&file),
            8192,
            PassPattern::Zero,
            &cancel,
            &mut |_| {},
        );

        assert!(matches!(result, Err(WipeError::Interrupted)));
        assert!(read_back(&mut file).iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_missing_device_fails() {
        let cancel = AtomicBool::new(false);
        let result = BlockOverwriter::default().write_pass(
            "/nonexistent/device",
            4096,
            PassPattern::Random,
            &cancel,
            &mut |_| {},
        );
        assert!(matches!(result, Err(WipeError::Io(_))));
    }

    #[test]
    fn test_chunk_size_never_zero() {
        assert_eq!(BlockOverwriter::new(0).chunk_size(), 1);
        assert_eq!(
            BlockOverwriter::default().chunk_size(),
            BlockOverwriter::DEFAULT_CHUNK_SIZE
        );
    }
}
