//! The upload pipeline: decode, analyze, normalize, persist.

use crate::analyzer::analyze;
use crate::normalizer::{normalize, NormalizeError};
use crate::store::StoredAnalysis;
use crate::upload::{read_table, save_upload, FileFormat, UploadError};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Run one uploaded file through the whole pipeline.
///
/// When `upload_dir` is given, the raw bytes of an accepted upload are stored
/// there. Rejected uploads leave nothing behind.
pub fn process_upload(
    analysis_id: &str,
    file_name: &str,
    bytes: &[u8],
    upload_dir: Option<&Path>,
) -> Result<StoredAnalysis, PipelineError> {
    if file_name.trim().is_empty() {
        return Err(UploadError::MissingFile.into());
    }
    FileFormat::from_file_name(file_name)?;

    let mut table = read_table(file_name, bytes)?;
    let result = analyze(analysis_id, file_name, &mut table);
    let normalization = normalize(&table)?;

    // Only accepted uploads reach the disk.
    let upload_path = upload_dir
        .map(|dir| save_upload(dir, analysis_id, file_name, bytes))
        .transpose()?;

    info!(
        analysis_id,
        file_name,
        records = result.total_records,
        columns = result.total_columns,
        text_columns = result.text_columns.len(),
        invalid_dates = normalization.invalid_dates,
        "upload analyzed"
    );

    Ok(StoredAnalysis { result, dataset: normalization.dataset, upload_path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::HEURISTIC_PRIORITY_COLUMN;

    const CSV: &str = "ID;Ciudad;Categoria;Urgencia;Comentario\n\
                       1;Cali;Salud;Alta;Urgente: el hospital no tiene medicamentos\n\
                       2;Pasto;Transporte;Baja;Gracias por el nuevo bus\n";

    #[test]
    fn test_pipeline_without_persistence() {
        let stored = process_upload("abc", "reportes.csv", CSV.as_bytes(), None).unwrap();
        assert!(stored.upload_path.is_none());
        assert_eq!(stored.result.total_records, 2);
        assert_eq!(stored.result.text_columns, vec!["Comentario"]);
        assert_eq!(stored.dataset.len(), 2);
        // The heuristic priority travels into the normalized records.
        assert_eq!(stored.dataset.records[0].extra[HEURISTIC_PRIORITY_COLUMN], "90");
        assert_eq!(stored.dataset.records[0].priority, 90);
    }

    #[test]
    fn test_pipeline_persists_upload() {
        let dir = tempfile::tempdir().unwrap();
        let stored = process_upload("abc", "reportes.csv", CSV.as_bytes(), Some(dir.path())).unwrap();
        let path = stored.upload_path.unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::read(path).unwrap(), CSV.as_bytes());
    }

    #[test]
    fn test_pipeline_rejects_bad_input() {
        assert!(matches!(
            process_upload("abc", "notas.txt", b"hola", None),
            Err(PipelineError::Upload(UploadError::UnsupportedFormat(_)))
        ));
        assert!(matches!(
            process_upload("abc", "", b"hola", None),
            Err(PipelineError::Upload(UploadError::MissingFile))
        ));
        assert!(matches!(
            process_upload("abc", "vacio.csv", b"", None),
            Err(PipelineError::Upload(UploadError::EmptyFile))
        ));
    }

    #[test]
    fn test_rejected_upload_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            process_upload("id1", "bad.csv", b"solo\n1\n2\n", Some(dir.path())),
            Err(PipelineError::Upload(UploadError::Unreadable))
        ));
        assert!(process_upload("id2", "vacio.csv", b"", Some(dir.path())).is_err());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }
}
