//! Delivering a rendered invoice: save to disk, open in the system viewer.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;
use crate::receipt::InvoiceRender;

/// Write the PDF under `output_dir` using the render's file name.
/// Returns the written path.
pub fn write_invoice_file(output_dir: &Path, render: &InvoiceRender) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let file_path = output_dir.join(&render.filename);
    fs::write(&file_path, &render.bytes)?;
    info!(
        path = %file_path.display(),
        size = render.bytes.len(),
        "Invoice written"
    );
    Ok(file_path)
}

pub fn open_in_viewer(path: &Path) -> Result<()> {
    let absolute = fs::canonicalize(path)?;
    webbrowser::open(&absolute.to_string_lossy())?;
    Ok(())
}

/// Save the invoice and optionally open it. A viewer failure is logged; the
/// file on disk is the artifact.
pub fn deliver(render: &InvoiceRender, output_dir: &Path, open: bool) -> Result<PathBuf> {
    let path = write_invoice_file(output_dir, render)?;
    if open {
        if let Err(e) = open_in_viewer(&path) {
            warn!(path = %path.display(), error = %e, "Could not open invoice viewer");
        }
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render() -> InvoiceRender {
        InvoiceRender {
            filename: "facture_CMD-1_FR.pdf".to_string(),
            bytes: b"%PDF-1.4\n%%EOF\n".to_vec(),
            page_count: 1,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn writes_into_nested_output_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("invoices").join("2026");
        let path = write_invoice_file(&out, &render()).expect("write");
        assert_eq!(path, out.join("facture_CMD-1_FR.pdf"));
        assert_eq!(fs::read(&path).expect("read back"), render().bytes);
    }

    #[test]
    fn overwrites_previous_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_invoice_file(dir.path(), &render()).expect("first write");
        let mut second = render();
        second.bytes = b"%PDF-1.4\nsecond\n%%EOF\n".to_vec();
        let path = write_invoice_file(dir.path(), &second).expect("second write");
        assert_eq!(fs::read(path).expect("read back"), second.bytes);
    }

    #[test]
    fn deliver_without_open_only_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = deliver(&render(), dir.path(), false).expect("deliver");
        assert!(path.is_file());
    }
}
