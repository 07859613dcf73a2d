use crate::error::IngestError;
use crate::extractor::PdfExtractor;
use crate::models::{Credential, PageUnit, PdfDocument, SkippedPdf, SourceSet};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Lists the `*.pdf` files directly inside `folder`, sorted.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

impl SourceSet {
    pub fn from_dir(folder: &Path, credential: Credential) -> Result<Self, IngestError> {
        let files = discover_pdf_files(folder);
        if files.is_empty() {
            return Err(IngestError::NoPdfFiles(folder.display().to_string()));
        }
        Ok(Self::new(files, credential))
    }
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub documents: Vec<PdfDocument>,
    pub pages: Vec<PageUnit>,
    pub skipped: Vec<SkippedPdf>,
}

/// Extracts page text from every path. Files that fail are logged and
/// skipped; the call only fails when nothing could be loaded.
pub fn load_documents(
    paths: &[PathBuf],
    extractor: &dyn PdfExtractor,
) -> Result<LoadReport, IngestError> {
    let mut documents = Vec::new();
    let mut pages = Vec::new();
    let mut skipped = Vec::new();

    for path in paths {
        match load_one(path, extractor) {
            Ok((document, document_pages)) => {
                info!(
                    file = %document.file_name,
                    pages = document_pages.len(),
                    "loaded pdf"
                );
                documents.push(document);
                pages.extend(document_pages);
            }
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipping pdf");
                skipped.push(SkippedPdf {
                    path: path.clone(),
                    reason: error.to_string(),
                });
            }
        }
    }

    if documents.is_empty() {
        return Err(IngestError::NoDocuments);
    }

    Ok(LoadReport {
        documents,
        pages,
        skipped,
    })
}

fn load_one(
    path: &Path,
    extractor: &dyn PdfExtractor,
) -> Result<(PdfDocument, Vec<PageUnit>), IngestError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?
        .to_string();
    let source_path = path.to_string_lossy().to_string();
    let checksum = digest_file(path)?;

    let pages = extractor
        .extract_pages(path)?
        .into_iter()
        .map(|page| PageUnit {
            source: file_name.clone(),
            source_path: source_path.clone(),
            page: page.number,
            text: page.text,
        })
        .collect::<Vec<_>>();

    let document = PdfDocument {
        source_path,
        file_name,
        checksum,
        page_count: pages.len(),
        loaded_at: Utc::now(),
    };

    Ok((document, pages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::LopdfExtractor;
    use crate::test_support::write_text_pdf;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discover_lists_only_top_level_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("b.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4"))?;
        File::create(base.join("A.PDF")).and_then(|mut file| file.write_all(b"%PDF-1.4"))?;
        File::create(base.join("notes.txt")).and_then(|mut file| file.write_all(b"text"))?;
        File::create(nested.join("c.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4"))?;

        let files = discover_pdf_files(base);
        let names: Vec<_> = files
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .collect();

        assert_eq!(names, vec!["A.PDF", "b.pdf"]);
        Ok(())
    }

    #[test]
    fn empty_folder_has_no_source_set() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = SourceSet::from_dir(dir.path(), Credential::new("sk-test"));
        assert!(matches!(result, Err(IngestError::NoPdfFiles(_))));
        Ok(())
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.pdf");
        fs::write(&file_path, b"abc")?;

        let first = digest_file(&file_path)?;
        let second = digest_file(&file_path)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn pages_are_tagged_with_their_file_name() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let rules = dir.path().join("rules.pdf");
        write_text_pdf(&rules, &["Article 5: Matches last 90 minutes.", "Article 6: Two halves."])?;

        let report = load_documents(&[rules], &LopdfExtractor)?;

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].file_name, "rules.pdf");
        assert_eq!(report.documents[0].page_count, 2);
        assert_eq!(report.pages.len(), 2);
        assert!(report.pages.iter().all(|page| page.source == "rules.pdf"));
        assert!(report.skipped.is_empty());
        Ok(())
    }

    #[test]
    fn unreadable_files_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let good = dir.path().join("good.pdf");
        let broken = dir.path().join("broken.pdf");
        write_text_pdf(&good, &["Article 1: The field is rectangular."])?;
        fs::write(&broken, b"%PDF-1.4\n%broken")?;

        let paths = vec![broken.clone(), good];
        let report = load_documents(&paths, &LopdfExtractor)?;

        assert!(report.documents.len() <= paths.len());
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, broken);
        assert!(report.pages.iter().all(|page| page.source != "broken.pdf"));
        Ok(())
    }

    #[test]
    fn only_corrupted_files_means_no_documents() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let broken = dir.path().join("corrupted.pdf");
        fs::write(&broken, b"%PDF-1.4\n%broken")?;

        let result = load_documents(&[broken], &LopdfExtractor);

        assert!(matches!(result, Err(IngestError::NoDocuments)));
        Ok(())
    }
}
