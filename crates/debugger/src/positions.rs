//! Translating positions between generated scripts and their original
//! sources.
//!
//! Maps are loaded lazily per generated file and cached, including the
//! absence of a map. A map that fails to load is logged once and the file
//! is then treated as unmapped.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use sourcemap::{DecodedSourceMap, Position, locate};

use crate::types::OriginalLocation;

/// A zero-based position in a generated script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GeneratedLocation {
    pub(crate) file: PathBuf,
    pub(crate) line: u32,
    pub(crate) column: u32,
}

#[derive(Debug, Default)]
pub(crate) struct SourceMapCache {
    maps: HashMap<PathBuf, Option<Arc<DecodedSourceMap>>>,
}

impl SourceMapCache {
    fn map_for(&mut self, generated: &Path) -> Option<Arc<DecodedSourceMap>> {
        if let Some(cached) = self.maps.get(generated) {
            return cached.clone();
        }
        let loaded = match locate::load_for_generated_file(generated) {
            Ok(map) => map.map(Arc::new),
            Err(e) => {
                tracing::warn!(file = %generated.display(), error = %e, "ignoring source map");
                None
            }
        };
        self.maps.insert(generated.to_path_buf(), loaded.clone());
        loaded
    }

    /// Forget the cached map for `generated`, e.g. after its source changed.
    pub(crate) fn invalidate(&mut self, generated: &Path) {
        self.maps.remove(generated);
    }

    /// The original location of a zero-based position in the script named
    /// `script`.
    pub(crate) fn to_original(
        &mut self,
        script: &str,
        line: u32,
        column: u32,
    ) -> Option<OriginalLocation> {
        let path = Path::new(script);
        if !path.is_absolute() || !path.is_file() {
            return None;
        }
        let map = self.map_for(path)?;
        let point = map.original_position_for(Position::new(line + 1, column + 1))?;
        let source = point.source?;
        let file = source
            .url
            .to_file_path()
            .unwrap_or_else(|_| PathBuf::from(&source.path));
        Some(OriginalLocation {
            file,
            line: point.position.line.saturating_sub(1),
            column: point.position.column.saturating_sub(1),
            name: point.name.map(str::to_string),
        })
    }

    /// The generated location for a zero-based position in an original
    /// source file. The generated script is expected next to the original
    /// with a `.js` extension.
    pub(crate) fn to_generated(
        &mut self,
        original: &str,
        line: u32,
        column: u32,
    ) -> Option<GeneratedLocation> {
        let original_path = std::path::absolute(original).ok()?;
        if original_path.extension().is_some_and(|ext| ext == "js") {
            return None;
        }
        let generated = original_path.with_extension("js");
        if !generated.is_file() {
            return None;
        }
        let map = self.map_for(&generated)?;
        let position = map.generated_position_for(
            &original_path.to_string_lossy(),
            Position::new(line + 1, column + 1),
        )?;
        Some(GeneratedLocation {
            file: generated,
            line: position.line.saturating_sub(1),
            column: position.column.saturating_sub(1),
        })
    }
}
