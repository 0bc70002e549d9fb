//! Finding the source map for a generated file.

use std::path::Path;

use url::Url;

use crate::{decoder::DecodedSourceMap, error::SourceMapError};

const SOURCE_MAPPING_URL_PREFIXES: [&str; 2] = ["//# sourceMappingURL=", "//@ sourceMappingURL="];

/// Extract the `sourceMappingURL` reference from the last non-empty line of
/// a generated file.
pub fn source_mapping_url(generated: &str) -> Option<&str> {
    let last_line = generated
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())?
        .trim();

    SOURCE_MAPPING_URL_PREFIXES
        .iter()
        .find_map(|prefix| last_line.strip_prefix(prefix))
        .map(str::trim)
        .filter(|reference| !reference.is_empty())
}

/// Load and decode the source map referenced by the generated file at `path`.
///
/// Returns `Ok(None)` when the file carries no `sourceMappingURL` comment.
pub fn load_for_generated_file(path: &Path) -> Result<Option<DecodedSourceMap>, SourceMapError> {
    let generated = std::fs::read_to_string(path)?;
    let Some(reference) = source_mapping_url(&generated) else {
        return Ok(None);
    };
    if reference.starts_with("data:") {
        return Err(SourceMapError::UnsupportedFormat(
            "inline data: source maps".to_string(),
        ));
    }

    let absolute = std::path::absolute(path)?;
    let generated_url = Url::from_file_path(&absolute).map_err(|_| {
        SourceMapError::UnsupportedFormat(format!("{} is not a local path", absolute.display()))
    })?;
    let map_url = generated_url.join(reference)?;
    let map_path = map_url.to_file_path().map_err(|_| {
        SourceMapError::UnsupportedFormat(format!("source map {map_url} is not a local file"))
    })?;

    tracing::debug!(generated = %absolute.display(), map = %map_path.display(), "loading source map");
    let json = std::fs::read_to_string(&map_path)?;
    DecodedSourceMap::decode(&json, &map_url).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_modern_comment() {
        let text = "console.log(1);\n//# sourceMappingURL=app.js.map\n\n";
        assert_eq!(source_mapping_url(text), Some("app.js.map"));
    }

    #[test]
    fn finds_legacy_comment() {
        let text = "console.log(1);\r\n//@ sourceMappingURL=maps/app.js.map  ";
        assert_eq!(source_mapping_url(text), Some("maps/app.js.map"));
    }

    #[test]
    fn only_the_last_line_counts() {
        let text = "//# sourceMappingURL=app.js.map\nconsole.log(1);\n";
        assert_eq!(source_mapping_url(text), None);
        assert_eq!(source_mapping_url(""), None);
        assert_eq!(source_mapping_url("//# sourceMappingURL="), None);
    }
}
