//! Decoding an encoded source map into span mappings.

use serde::Deserialize;
use url::Url;

use crate::{error::SourceMapError, vlq};

/// A 1-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// An inclusive range of positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }
}

/// One decoded mapping segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanMapping {
    pub generated: Position,
    pub original: Position,
    /// Index into the map's `sources`.
    pub source_index: usize,
    /// Index into the map's `names`, when the segment carried one.
    pub name_index: Option<usize>,
}

/// A run of mappings belonging to one original source.
///
/// A new record starts every time the source index changes between
/// consecutive mappings, so one original file may own several records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// `sourceRoot` joined with the `sources` entry.
    pub path: String,
    /// `path` resolved against the map's own location.
    pub url: Url,
    pub source_index: usize,
    /// Index of the first mapping of this run.
    pub first_mapping: usize,
}

impl SourceFile {
    fn resolve(
        source_root: &str,
        source: &str,
        source_index: usize,
        first_mapping: usize,
        map_location: &Url,
    ) -> Result<Self, SourceMapError> {
        let path = if source_root.is_empty() || source_root.ends_with('/') {
            format!("{source_root}{source}")
        } else {
            format!("{source_root}/{source}")
        };

        let url = match Url::parse(&path) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => map_location.join(&path)?,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            url,
            source_index,
            first_mapping,
        })
    }

    /// Case-insensitive match against the joined path, the URL, or the URL's
    /// local file path.
    pub fn matches(&self, file: &str) -> bool {
        if self.path.eq_ignore_ascii_case(file) || self.url.as_str().eq_ignore_ascii_case(file) {
            return true;
        }
        match self.url.to_file_path() {
            Ok(local) => local.to_string_lossy().eq_ignore_ascii_case(file),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    version: Option<u32>,
    file: Option<String>,
    sources: Option<Vec<String>>,
    names: Option<Vec<String>>,
    source_root: Option<String>,
    mappings: Option<String>,
}

fn required<T>(field: Option<T>, name: &str) -> Result<T, SourceMapError> {
    field.ok_or_else(|| SourceMapError::UnsupportedFormat(format!("missing `{name}` field")))
}

fn checked_index(value: i64, len: usize, what: &str) -> Result<usize, SourceMapError> {
    usize::try_from(value)
        .ok()
        .filter(|index| *index < len)
        .ok_or_else(|| {
            SourceMapError::Decoding(format!("{what} index {value} out of range (0..{len})"))
        })
}

fn checked_position(line: i64, column: i64) -> Result<Position, SourceMapError> {
    match (u32::try_from(line), u32::try_from(column)) {
        (Ok(line), Ok(column)) if line >= 1 && column >= 1 => Ok(Position { line, column }),
        _ => Err(SourceMapError::Decoding(format!(
            "position ({line}, {column}) out of range"
        ))),
    }
}

/// A fully decoded source map.
///
/// Mappings are stored in generated order: the encoding only ever moves
/// forward through the generated file, and the lookups rely on that.
#[derive(Debug, Clone)]
pub struct DecodedSourceMap {
    file: Option<String>,
    names: Vec<String>,
    mappings: Vec<SpanMapping>,
    source_files: Vec<SourceFile>,
}

impl DecodedSourceMap {
    /// Decode the JSON text of a source map located at `map_location`.
    pub fn decode(json: &str, map_location: &Url) -> Result<Self, SourceMapError> {
        let raw: RawSourceMap = serde_json::from_str(json)?;

        let mappings = required(raw.mappings, "mappings")?;
        let names = required(raw.names, "names")?;
        let source_root = required(raw.source_root, "sourceRoot")?;
        let sources = required(raw.sources, "sources")?;
        if let Some(version) = raw.version.filter(|v| *v != 3) {
            tracing::warn!(version, %map_location, "unexpected source map version");
        }

        let mut decoded = Vec::new();
        let mut source_files: Vec<SourceFile> = Vec::new();

        // running totals across the whole map
        let mut source_index: i64 = 0;
        let mut original_line: i64 = 0;
        let mut original_column: i64 = 0;
        let mut name_index: i64 = 0;

        for (line_offset, line) in mappings.split(';').enumerate() {
            let generated_line = line_offset as i64 + 1;
            let mut generated_column: i64 = 0;

            for segment in line.split(',').filter(|s| !s.is_empty()) {
                let fields = vlq::decode_segment(segment)?;
                match fields.len() {
                    4 | 5 => {}
                    1 => {
                        return Err(SourceMapError::UnsupportedFormat(format!(
                            "segment {segment:?} has no original position"
                        )));
                    }
                    n => {
                        return Err(SourceMapError::Decoding(format!(
                            "segment {segment:?} has {n} fields"
                        )));
                    }
                }

                generated_column += fields[0];
                source_index += fields[1];
                original_line += fields[2];
                original_column += fields[3];
                let name = match fields.get(4) {
                    Some(delta) => {
                        name_index += delta;
                        Some(checked_index(name_index, names.len(), "name")?)
                    }
                    None => None,
                };

                let source = checked_index(source_index, sources.len(), "source")?;
                let generated = checked_position(generated_line, generated_column + 1)?;
                let original = checked_position(original_line + 1, original_column + 1)?;

                if source_files.last().map(|f| f.source_index) != Some(source) {
                    source_files.push(SourceFile::resolve(
                        &source_root,
                        &sources[source],
                        source,
                        decoded.len(),
                        map_location,
                    )?);
                }

                decoded.push(SpanMapping {
                    generated,
                    original,
                    source_index: source,
                    name_index: name,
                });
            }
        }

        tracing::debug!(
            mappings = decoded.len(),
            source_files = source_files.len(),
            %map_location,
            "decoded source map"
        );

        Ok(Self {
            file: raw.file,
            names,
            mappings: decoded,
            source_files,
        })
    }

    /// The generated file this map describes, if the map names one.
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn mappings(&self) -> &[SpanMapping] {
        &self.mappings
    }

    pub fn source_files(&self) -> &[SourceFile] {
        &self.source_files
    }

    pub(crate) fn name_of(&self, mapping: &SpanMapping) -> Option<&str> {
        mapping
            .name_index
            .and_then(|index| self.names.get(index))
            .map(String::as_str)
    }

    /// The source file record owning the mapping at `index`.
    pub(crate) fn source_file_at(&self, index: usize) -> Option<&SourceFile> {
        let after = self
            .source_files
            .partition_point(|f| f.first_mapping <= index);
        after.checked_sub(1).map(|i| &self.source_files[i])
    }

    /// The mapping index range covered by the source file record at `record`.
    pub(crate) fn record_range(&self, record: usize) -> std::ops::Range<usize> {
        let floor = self.source_files[record].first_mapping;
        let ceiling = self
            .source_files
            .get(record + 1)
            .map(|next| next.first_mapping)
            .unwrap_or(self.mappings.len());
        floor..ceiling
    }
}
