//! Archive fixtures built in memory
//!
//! Member contents are kept ASCII so wiremock can match uploads by body text.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{Cursor, Write};

/// Contents of a harmless text file
pub const CLEAN_TEXT: &[u8] = b"just some notes\n";

/// Stand-in for a flagged executable
pub const EVIL_PAYLOAD: &[u8] = b"MZ this pretends to be malware";

/// ZIP archive holding `files`
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer
            .start_file(*name, zip::write::FileOptions::default())
            .expect("start zip entry");
        writer.write_all(content).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Gzip-compressed tarball holding `files`
pub fn tar_gz_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, *content)
            .expect("append tar entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}
