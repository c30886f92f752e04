use crate::domain::model::{EndpointDescriptor, EndpointKind};
use crate::utils::error::{EtlError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterKind {
    FileToDatabase,
    FileToOutput,
    /// 尚未實作的組合，不做任何 I/O
    Unimplemented,
}

impl fmt::Display for ConverterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConverterKind::FileToDatabase => f.write_str("file-to-database"),
            ConverterKind::FileToOutput => f.write_str("file-to-output"),
            ConverterKind::Unimplemented => f.write_str("unimplemented"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    SameKind,
    Forbidden(&'static str),
    Convert(ConverterKind),
}

use Cell::{Convert, Forbidden, SameKind};
use ConverterKind::{FileToDatabase, FileToOutput, Unimplemented};

// 列為 source，欄為 target，順序同 EndpointKind::index
const MATRIX: [[Cell; 4]; 4] = [
    // FILE
    [
        SameKind,
        Convert(FileToDatabase),
        Convert(FileToOutput),
        Convert(Unimplemented),
    ],
    // DATABASE
    [
        Forbidden("exporting database tables to files is not supported"),
        SameKind,
        Convert(Unimplemented),
        Convert(Unimplemented),
    ],
    // OUTPUT
    [
        Convert(Unimplemented),
        Convert(Unimplemented),
        SameKind,
        Convert(Unimplemented),
    ],
    // API
    [
        Convert(Unimplemented),
        Convert(Unimplemented),
        Convert(Unimplemented),
        SameKind,
    ],
];

/// 查表決定 (source, target) 是否合法以及對應的轉換器
pub fn converter_kind(source: EndpointKind, target: EndpointKind) -> Result<ConverterKind> {
    let illegal = |reason: String| EtlError::IllegalConversionError {
        source_kind: source.to_string(),
        target_kind: target.to_string(),
        reason,
    };

    if source == target {
        return Err(illegal(format!("source and target are both {}", source)));
    }

    match MATRIX[source.index()][target.index()] {
        Convert(kind) => Ok(kind),
        Forbidden(reason) => Err(illegal(reason.to_string())),
        SameKind => Err(illegal(format!("source and target are both {}", source))),
    }
}

/// 一次執行所選定的轉換，持有兩端的描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterHandle {
    pub kind: ConverterKind,
    pub source: EndpointDescriptor,
    pub target: EndpointDescriptor,
}

pub fn dispatch(source: EndpointDescriptor, target: EndpointDescriptor) -> Result<ConverterHandle> {
    tracing::info!("🧭 Source: {} Target: {}", source, target);

    match converter_kind(source.kind(), target.kind()) {
        Ok(kind) => {
            tracing::info!("🔀 Selected {} converter", kind);
            Ok(ConverterHandle {
                kind,
                source,
                target,
            })
        }
        Err(e) => {
            tracing::error!("⛔ {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(kind: EndpointKind) -> EndpointDescriptor {
        match kind {
            EndpointKind::File => EndpointDescriptor::file("same.csv", Some(",".to_string())),
            EndpointKind::Database => EndpointDescriptor::database(
                "same",
                crate::domain::model::DatabaseParams {
                    db_type: "sqlite".to_string(),
                    url: None,
                    credentials: None,
                },
            ),
            EndpointKind::Output => EndpointDescriptor::output("csv"),
            EndpointKind::Api => EndpointDescriptor::api("same"),
        }
    }

    #[test]
    fn test_equal_kinds_are_always_illegal() {
        for kind in EndpointKind::ALL {
            let err = dispatch(descriptor(kind), descriptor(kind)).unwrap_err();
            assert!(matches!(err, EtlError::IllegalConversionError { .. }));
        }
    }

    #[test]
    fn test_database_to_file_is_illegal() {
        let err = converter_kind(EndpointKind::Database, EndpointKind::File).unwrap_err();
        match err {
            EtlError::IllegalConversionError { reason, .. } => {
                assert!(reason.contains("not supported"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_only_two_cells_carry_real_converters() {
        let mut real = Vec::new();
        let mut placeholders = 0;

        for source in EndpointKind::ALL {
            for target in EndpointKind::ALL {
                match converter_kind(source, target) {
                    Ok(ConverterKind::Unimplemented) => placeholders += 1,
                    Ok(kind) => real.push((source, target, kind)),
                    Err(_) => {}
                }
            }
        }

        assert_eq!(
            real,
            vec![
                (
                    EndpointKind::File,
                    EndpointKind::Database,
                    ConverterKind::FileToDatabase
                ),
                (
                    EndpointKind::File,
                    EndpointKind::Output,
                    ConverterKind::FileToOutput
                ),
            ]
        );
        // 12 個非對角線格子，扣掉兩個實作與 DATABASE -> FILE
        assert_eq!(placeholders, 9);
    }

    #[test]
    fn test_dispatch_moves_descriptors_into_handle() {
        let handle = dispatch(
            descriptor(EndpointKind::File),
            descriptor(EndpointKind::Output),
        )
        .unwrap();

        assert_eq!(handle.kind, ConverterKind::FileToOutput);
        assert_eq!(handle.source.kind(), EndpointKind::File);
        assert_eq!(handle.target.identifier(), "csv");
    }
}
