//! Position queries over a decoded source map.

use crate::decoder::{DecodedSourceMap, Position, SourceFile, Span, SpanMapping};

/// The result of mapping a span from one coordinate space to the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedSpan<'a> {
    pub span: Span,
    /// Name attached to the mapping the span starts at.
    pub name: Option<&'a str>,
    /// The original source file the span belongs to.
    pub source: &'a SourceFile,
}

/// The result of mapping a single point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPoint<'a> {
    pub position: Position,
    pub name: Option<&'a str>,
    pub source: Option<&'a SourceFile>,
}

impl DecodedSourceMap {
    /// Map a span of the generated file to the original source.
    ///
    /// Starts at the first mapping inside the span and ends at the first
    /// mapping at or past the span's end, or the last mapping when none is.
    /// Returns `None` when no mapping falls inside the span.
    pub fn map_generated_span(&self, span: Span) -> Option<MappedSpan<'_>> {
        let mappings = self.mappings();
        let start = mappings.iter().position(|m| span.contains(m.generated))?;
        let end = mappings[start..]
            .iter()
            .position(|m| m.generated >= span.end)
            .map(|offset| start + offset)
            .unwrap_or(mappings.len() - 1);

        let source = self
            .source_file_preceding(span.start)
            .or_else(|| self.source_file_at(start))?;

        Some(MappedSpan {
            span: Span::new(mappings[start].original, mappings[end].original),
            name: self.name_of(&mappings[start]),
            source,
        })
    }

    /// Map a span of the original file `file` to the generated file.
    ///
    /// The search is limited to the mappings belonging to `file`, starting
    /// from the first mapping that introduced it.
    pub fn map_original_span(&self, file: &str, span: Span) -> Option<MappedSpan<'_>> {
        for (record, source) in self.source_files().iter().enumerate() {
            if !source.matches(file) {
                continue;
            }
            let range = self.record_range(record);
            let mappings = &self.mappings()[range];
            let Some(start) = mappings.iter().position(|m| span.contains(m.original)) else {
                continue;
            };
            let end = mappings[start..]
                .iter()
                .position(|m| m.original >= span.end)
                .map(|offset| start + offset)
                .unwrap_or(mappings.len() - 1);

            return Some(MappedSpan {
                span: Span::new(mappings[start].generated, mappings[end].generated),
                name: self.name_of(&mappings[start]),
                source,
            });
        }
        None
    }

    /// Map a generated point to the original point with exactly that
    /// generated position.
    ///
    /// Falls back to `(1, 1)` in the first source file when the point is
    /// absent or unmapped.
    pub fn map_generated_point(&self, point: Option<Position>) -> MappedPoint<'_> {
        let found = point.and_then(|point| {
            self.mappings()
                .iter()
                .position(|m| m.generated == point)
        });
        match found {
            Some(index) => {
                let mapping = &self.mappings()[index];
                MappedPoint {
                    position: mapping.original,
                    name: self.name_of(mapping),
                    source: self.source_file_at(index),
                }
            }
            None => self.fallback_point(),
        }
    }

    /// Map an original point in `file` to the generated point with exactly
    /// that original position, with the same fallback as
    /// [`DecodedSourceMap::map_generated_point`].
    pub fn map_original_point(&self, file: Option<&str>, point: Option<Position>) -> MappedPoint<'_> {
        let (Some(file), Some(point)) = (file, point) else {
            return self.fallback_point();
        };
        for (record, source) in self.source_files().iter().enumerate() {
            if !source.matches(file) {
                continue;
            }
            let range = self.record_range(record);
            if let Some(mapping) = self.mappings()[range]
                .iter()
                .find(|m| m.original == point)
            {
                return MappedPoint {
                    position: mapping.generated,
                    name: self.name_of(mapping),
                    source: Some(source),
                };
            }
        }
        self.fallback_point()
    }

    /// The original position of the nearest mapping at or before `generated`
    /// on the same generated line.
    pub fn original_position_for(&self, generated: Position) -> Option<MappedPoint<'_>> {
        let after = self
            .mappings()
            .partition_point(|m| m.generated <= generated);
        let index = after.checked_sub(1)?;
        let mapping = &self.mappings()[index];
        if mapping.generated.line != generated.line {
            return None;
        }
        Some(MappedPoint {
            position: mapping.original,
            name: self.name_of(mapping),
            source: self.source_file_at(index),
        })
    }

    /// The generated position for an original position in `file`.
    ///
    /// Prefers the mapping closest at or after the requested column on the
    /// same original line, then the first mapping on a later line.
    pub fn generated_position_for(&self, file: &str, original: Position) -> Option<Position> {
        let candidates: Vec<&SpanMapping> = self
            .source_files()
            .iter()
            .enumerate()
            .filter(|(_, source)| source.matches(file))
            .flat_map(|(record, _)| self.mappings()[self.record_range(record)].iter())
            .collect();

        let same_line = candidates
            .iter()
            .filter(|m| m.original.line == original.line && m.original.column >= original.column)
            .min_by_key(|m| (m.original.column, m.generated));
        if let Some(mapping) = same_line {
            return Some(mapping.generated);
        }

        candidates
            .iter()
            .filter(|m| m.original.line > original.line)
            .min_by_key(|m| (m.original, m.generated))
            .map(|m| m.generated)
    }

    fn source_file_preceding(&self, position: Position) -> Option<&SourceFile> {
        self.source_files()
            .iter()
            .rev()
            .find(|f| self.mappings()[f.first_mapping].generated <= position)
    }

    fn fallback_point(&self) -> MappedPoint<'_> {
        MappedPoint {
            position: Position::new(1, 1),
            name: None,
            source: self.source_files().first(),
        }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn decode(sources: &[&str], names: &[&str], mappings: &str) -> DecodedSourceMap {
        let json = serde_json::json!({
            "version": 3,
            "file": "app.js",
            "sourceRoot": "",
            "sources": sources,
            "names": names,
            "mappings": mappings,
        });
        let location = Url::parse("file:///project/out/app.js.map").unwrap();
        DecodedSourceMap::decode(&json.to_string(), &location).unwrap()
    }

    #[test]
    fn generated_span_spans_first_and_last_entries() {
        let map = decode(&["../src/app.ts"], &[], "AAAA,MAAM,CAAC");
        let mapped = map
            .map_generated_span(Span::new(Position::new(1, 1), Position::new(1, 8)))
            .unwrap();
        assert_eq!(
            mapped.span,
            Span::new(Position::new(1, 1), Position::new(1, 8))
        );
        assert_eq!(mapped.source.path, "../src/app.ts");
        assert_eq!(mapped.name, None);
    }

    #[test]
    fn generated_span_end_falls_back_to_last_mapping() {
        let map = decode(&["a.ts"], &[], "AAAA,MAAM,CAAC");
        let mapped = map
            .map_generated_span(Span::new(Position::new(1, 7), Position::new(4, 1)))
            .unwrap();
        assert_eq!(mapped.span.start, Position::new(1, 7));
        assert_eq!(mapped.span.end, Position::new(1, 8));
    }

    #[test]
    fn generated_span_without_mapping_is_none() {
        let map = decode(&["a.ts"], &[], "AAAA;;AACA");
        assert!(
            map.map_generated_span(Span::new(Position::new(2, 1), Position::new(2, 40)))
                .is_none()
        );
    }

    #[test]
    fn every_recorded_generated_point_maps_exactly() {
        let map = decode(&["a.ts", "b.ts"], &["greet", "who"], "AAAAA,IAAIC;ACCAD,GAAG");
        for (index, mapping) in map.mappings().iter().enumerate() {
            let mapped = map.map_generated_point(Some(mapping.generated));
            assert_eq!(mapped.position, mapping.original, "mapping {index}");
            assert_eq!(mapped.name, map.name_of(mapping));
            assert_eq!(
                mapped.source.unwrap().source_index,
                mapping.source_index
            );
        }
    }

    #[test]
    fn point_fallback_is_permissive() {
        let map = decode(&["a.ts", "b.ts"], &[], "AAAA,ICAI");
        let missing = map.map_generated_point(Some(Position::new(9, 9)));
        assert_eq!(missing.position, Position::new(1, 1));
        assert_eq!(missing.name, None);
        assert_eq!(missing.source.unwrap().path, "a.ts");

        let absent = map.map_original_point(None, Some(Position::new(1, 1)));
        assert_eq!(absent.position, Position::new(1, 1));
        assert_eq!(absent.source.unwrap().path, "a.ts");
    }

    #[test]
    fn original_span_is_scoped_to_file() {
        // a.ts 1:1 at gen 1:1, b.ts 1:1 at gen 1:5, b.ts 1:5 at gen 1:9
        let map = decode(&["a.ts", "b.ts"], &[], "AAAA,ICAA,IAAI");
        let mapped = map
            .map_original_span("B.TS", Span::new(Position::new(1, 1), Position::new(1, 5)))
            .unwrap();
        assert_eq!(mapped.source.path, "b.ts");
        assert_eq!(
            mapped.span,
            Span::new(Position::new(1, 5), Position::new(1, 9))
        );

        let mapped = map
            .map_original_span("a.ts", Span::new(Position::new(1, 1), Position::new(1, 1)))
            .unwrap();
        assert_eq!(mapped.span.start, Position::new(1, 1));

        assert!(
            map.map_original_span("c.ts", Span::new(Position::new(1, 1), Position::new(1, 1)))
                .is_none()
        );
    }

    #[test]
    fn original_point_matches_file_url() {
        let map = decode(&["../src/a.ts"], &["x"], "AAAA,IAAIA");
        let mapped = map.map_original_point(
            Some("file:///project/src/a.ts"),
            Some(Position::new(1, 5)),
        );
        assert_eq!(mapped.position, Position::new(1, 5));
        assert_eq!(mapped.name, Some("x"));
    }

    #[test]
    fn nearest_original_position() {
        let map = decode(&["a.ts"], &[], "AAAA,MAAM;AACN");
        let point = map.original_position_for(Position::new(1, 10)).unwrap();
        assert_eq!(point.position, Position::new(1, 7));

        let point = map.original_position_for(Position::new(2, 3)).unwrap();
        assert_eq!(point.position, Position::new(2, 1));

        let empty_line = decode(&["a.ts"], &[], ";AAAA");
        assert!(empty_line.original_position_for(Position::new(1, 4)).is_none());
    }

    #[test]
    fn nearest_generated_position() {
        // a.ts 1:1 -> 1:1, a.ts 1:7 -> 1:7, a.ts 3:1 -> 2:1
        let map = decode(&["a.ts"], &[], "AAAA,MAAM;AAEN");
        assert_eq!(
            map.generated_position_for("a.ts", Position::new(1, 3)),
            Some(Position::new(1, 7))
        );
        assert_eq!(
            map.generated_position_for("a.ts", Position::new(2, 1)),
            Some(Position::new(2, 1))
        );
        assert_eq!(map.generated_position_for("a.ts", Position::new(5, 1)), None);
        assert_eq!(map.generated_position_for("b.ts", Position::new(1, 1)), None);
    }
}
