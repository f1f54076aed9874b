//! Reading of the tables the subsetter needs from a TrueType font.
//!
//! [`FontReader`] validates the table directory up front, caches `head`, `maxp`, `loca` and the
//! Unicode format 4 `cmap` subtable, then hands out raw table and glyph data on request.

use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;

use log::{info, warn};

use crate::binary::read::ReadScope;
use crate::checksum::{self, HEAD_MAGIC};
use crate::error::{InternalError, InvalidInputError, ParseError, SubsetError};
use crate::tables::cmap::{Cmap, CmapSubtableFormat4};
use crate::tables::loca::LocaTable;
use crate::tables::{
    HeadTable, HheaTable, HmtxTable, MaxpTable, NameTable, OffsetTable, TableRecord,
};
use crate::tag::{DisplayTag, TableTag};

/// An observable problem with the input font that did not stop it being read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// `checkSumAdjustment` in `head` disagrees with the checksum of the whole file.
    FileChecksumMismatch { expected: u32, actual: u32 },
    /// The checksum in the table directory disagrees with the table data.
    TableChecksumMismatch { tag: u32, expected: u32, actual: u32 },
}

/// How checksum mismatches are handled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Severity {
    /// Record the mismatch and log it at info level.
    Info,
    /// Record the mismatch and log it at warn level.
    #[default]
    Warning,
    /// Reject the font.
    Error,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct ReaderOptions {
    pub checksum_severity: Severity,
}

/// Read access to a TrueType font held in memory.
pub struct FontReader<'a> {
    scope: ReadScope<'a>,
    offset_table: OffsetTable<'a>,
    head: HeadTable,
    maxp: MaxpTable,
    loca: LocaTable<'a>,
    glyf: ReadScope<'a>,
    cmap: Option<CmapSubtableFormat4<'a>>,
    diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::FileChecksumMismatch { expected, actual } => write!(
                f,
                "font checksum mismatch: expected 0x{:08x}, found 0x{:08x}",
                expected, actual
            ),
            Diagnostic::TableChecksumMismatch {
                tag,
                expected,
                actual,
            } => write!(
                f,
                "'{}' table checksum mismatch: expected 0x{:08x}, found 0x{:08x}",
                DisplayTag(*tag),
                expected,
                actual
            ),
        }
    }
}

impl<'a> FontReader<'a> {
    /// Read the font in `data`, reporting checksum mismatches as warnings.
    pub fn new(data: &'a [u8]) -> Result<Self, SubsetError> {
        Self::with_options(data, &ReaderOptions::default())
    }

    pub fn with_options(data: &'a [u8], options: &ReaderOptions) -> Result<Self, SubsetError> {
        let scope = ReadScope::new(data);
        let offset_table = scope
            .read::<OffsetTable<'_>>()
            .map_err(|err| match err {
                ParseError::BadVersion => SubsetError::from(InvalidInputError::BadMagic),
                err => SubsetError::from(err),
            })?;

        if let Some(record) = offset_table
            .table_records
            .iter()
            .find(|record| record.length == 0)
        {
            return Err(InvalidInputError::ZeroLengthTable(record.table_tag).into());
        }
        for table in TableTag::ALL {
            if table.is_required() && offset_table.find_table_record(table.tag()).is_none() {
                return Err(InvalidInputError::MissingTable(table.tag()).into());
            }
        }
        for table in TableTag::ALL {
            let record = offset_table.find_table_record(table.tag());
            if let (Some(record), Some(expected)) = (record, table.fixed_size()) {
                let actual = usize::try_from(record.length).map_err(ParseError::from)?;
                if actual != expected {
                    return Err(InvalidInputError::TableSize {
                        tag: table.tag(),
                        expected,
                        actual,
                    }
                    .into());
                }
            }
        }

        let head_scope = required_record(&offset_table, TableTag::Head)?.read_table(&scope)?;
        let head = head_scope.read::<HeadTable>()?;
        if head.magic_number != HEAD_MAGIC {
            return Err(InvalidInputError::BadMagic.into());
        }

        let diagnostics = verify_checksums(&scope, &offset_table, &head_scope, &head)?;
        for diagnostic in &diagnostics {
            match options.checksum_severity {
                Severity::Info => info!("{}", diagnostic),
                Severity::Warning => warn!("{}", diagnostic),
                Severity::Error => {
                    return Err(InvalidInputError::ChecksumMismatch(diagnostic.clone()).into())
                }
            }
        }

        let maxp = required_record(&offset_table, TableTag::Maxp)?
            .read_table(&scope)?
            .read::<MaxpTable>()?;
        let loca_scope = required_record(&offset_table, TableTag::Loca)?.read_table(&scope)?;
        if loca_scope.data().len()
            != LocaTable::expected_length(maxp.num_glyphs, head.index_to_loc_format)
        {
            return Err(InvalidInputError::InconsistentLoca.into());
        }
        let loca =
            loca_scope.read_dep::<LocaTable<'_>>((maxp.num_glyphs, head.index_to_loc_format))?;
        let glyf = required_record(&offset_table, TableTag::Glyf)?.read_table(&scope)?;

        let cmap = required_record(&offset_table, TableTag::Cmap)?
            .read_table(&scope)?
            .read::<Cmap<'_>>()?
            .find_format4_subtable()?
            .map(|(_record, subtable)| subtable);
        if cmap.is_none() {
            warn!("font has no format 4 unicode cmap subtable");
        }

        Ok(FontReader {
            scope,
            offset_table,
            head,
            maxp,
            loca,
            glyf,
            cmap,
            diagnostics,
        })
    }

    pub fn num_glyphs(&self) -> u16 {
        self.maxp.num_glyphs
    }

    pub fn head(&self) -> &HeadTable {
        &self.head
    }

    pub fn maxp(&self) -> &MaxpTable {
        &self.maxp
    }

    pub fn has_table(&self, table: TableTag) -> bool {
        self.offset_table.find_table_record(table.tag()).is_some()
    }

    /// Checksum mismatches found while reading the font.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The raw data of `table`.
    ///
    /// Optional tables (`cvt `, `fpgm` and `prep`) that are absent yield empty data.
    pub fn load_table(&self, table: TableTag) -> Result<&'a [u8], SubsetError> {
        match self.offset_table.find_table_record(table.tag()) {
            Some(record) => Ok(record.read_table(&self.scope)?.data()),
            None if table.is_required() => {
                Err(InvalidInputError::MissingTable(table.tag()).into())
            }
            None => Ok(&[]),
        }
    }

    /// The outline data of glyph `index`, which may be empty.
    pub fn load_glyph(&self, index: u16) -> Result<&'a [u8], SubsetError> {
        let num_glyphs = self.num_glyphs();
        if index >= num_glyphs {
            return Err(InternalError::GlyphOutOfRange { index, num_glyphs }.into());
        }
        let range = self.loca.glyph_range(index)?;
        let glyph = self.glyf.offset_length(range.start, range.len())?;
        Ok(glyph.data())
    }

    /// Map a Unicode code point to a glyph index through the format 4 `cmap` subtable.
    ///
    /// Returns 0 when the code point is not mapped.
    pub fn charcode_to_glyph_index(&self, code: u32) -> Result<u16, SubsetError> {
        let glyph_id = self.format4_subtable()?.map_glyph(code)?;
        Ok(glyph_id)
    }

    /// All code points mapped by the format 4 `cmap` subtable.
    pub fn cmap_mappings(&self) -> Result<BTreeMap<u32, u16>, SubsetError> {
        let mappings = self.format4_subtable()?.mappings()?;
        Ok(mappings)
    }

    /// The advance width of glyph `index` from `hmtx`.
    ///
    /// Glyphs past the last long metric share its advance.
    pub fn horizontal_advance(&self, index: u16) -> Result<u16, SubsetError> {
        let num_glyphs = self.num_glyphs();
        if index >= num_glyphs {
            return Err(InternalError::GlyphOutOfRange { index, num_glyphs }.into());
        }
        let hhea = ReadScope::new(self.load_table(TableTag::Hhea)?).read::<HheaTable>()?;
        let hmtx = ReadScope::new(self.load_table(TableTag::Hmtx)?)
            .read_dep::<HmtxTable<'_>>((
                usize::from(num_glyphs),
                usize::from(hhea.num_h_metrics),
            ))?;
        let advance = hmtx.horizontal_advance(index)?;
        Ok(advance)
    }

    /// The PostScript name of the font from the `name` table.
    ///
    /// The Windows Unicode English record is preferred over the Macintosh Roman one. The name
    /// must be printable ASCII without the PostScript delimiters `()[]{}<>/%`.
    pub fn postscript_name(&self) -> Result<String, SubsetError> {
        let scope = ReadScope::new(self.load_table(TableTag::Name)?);
        let format = scope.ctxt().read_u16be()?;
        if format > 1 {
            return Err(InvalidInputError::UnsupportedNameFormat(format).into());
        }
        let name_table = scope.read::<NameTable<'_>>()?;
        let name = match name_table.string_for(3, 1, 0x409, NameTable::POSTSCRIPT_NAME)? {
            Some(name) => Some(name),
            None => name_table.string_for(1, 0, 0, NameTable::POSTSCRIPT_NAME)?,
        };

        match name {
            None => Err(InvalidInputError::MissingPostscriptName.into()),
            Some(name) if name.is_empty() => Err(InvalidInputError::MissingPostscriptName.into()),
            Some(name) if !name.chars().all(is_postscript_char) => {
                Err(InvalidInputError::InvalidPostscriptName(name).into())
            }
            Some(name) => Ok(name),
        }
    }

    fn format4_subtable(&self) -> Result<&CmapSubtableFormat4<'a>, SubsetError> {
        self.cmap
            .as_ref()
            .ok_or(SubsetError::Internal(InternalError::MissingCmapSubtable))
    }
}

fn required_record(
    offset_table: &OffsetTable<'_>,
    table: TableTag,
) -> Result<TableRecord, SubsetError> {
    offset_table
        .find_table_record(table.tag())
        .ok_or_else(|| InvalidInputError::MissingTable(table.tag()).into())
}

/// Compare the stored checksums of the font and of each known table with the data.
fn verify_checksums(
    scope: &ReadScope<'_>,
    offset_table: &OffsetTable<'_>,
    head_scope: &ReadScope<'_>,
    head: &HeadTable,
) -> Result<Vec<Diagnostic>, SubsetError> {
    let mut diagnostics = Vec::new();

    let expected = checksum::checksum_adjustment(scope.data(), head_scope.base())?;
    if expected != head.check_sum_adjustment {
        diagnostics.push(Diagnostic::FileChecksumMismatch {
            expected,
            actual: head.check_sum_adjustment,
        });
    }

    for table in TableTag::ALL {
        let Some(record) = offset_table.find_table_record(table.tag()) else {
            continue;
        };
        let data = record.read_table(scope)?.data();
        let expected = match table {
            TableTag::Head => checksum::head_checksum(data)?,
            _ => checksum::table_checksum(data)?,
        };
        if expected.0 != record.checksum {
            diagnostics.push(Diagnostic::TableChecksumMismatch {
                tag: record.table_tag,
                expected: expected.0,
                actual: record.checksum,
            });
        }
    }

    Ok(diagnostics)
}

fn is_postscript_char(c: char) -> bool {
    matches!(c, '!'..='~') && !"()[]{}<>/%".contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag;
    use crate::tests::{assemble, find_table, SyntheticFont};

    fn patch(font: &mut [u8], table: &[u8; 4], offset: usize, bytes: &[u8]) {
        let (start, _) = find_table(font, table).unwrap();
        font[start + offset..start + offset + bytes.len()].copy_from_slice(bytes);
    }

    fn invalid_input(result: Result<FontReader<'_>, SubsetError>) -> InvalidInputError {
        match result {
            Err(SubsetError::InvalidInput(err)) => err,
            Err(err) => panic!("expected invalid input, got {}", err),
            Ok(_) => panic!("expected invalid input"),
        }
    }

    #[test]
    fn test_read_synthetic_font() {
        let synthetic = SyntheticFont::default();
        let data = synthetic.build();
        let reader = FontReader::new(&data).unwrap();

        assert_eq!(reader.num_glyphs(), 7);
        assert_eq!(reader.head().units_per_em, 1000);
        assert!(reader.diagnostics().is_empty());
        assert!(reader.has_table(TableTag::Os2));
        assert!(!reader.has_table(TableTag::Fpgm));
        assert_eq!(reader.load_table(TableTag::Fpgm).unwrap(), &[] as &[u8]);
        assert_eq!(
            reader.load_table(TableTag::Hmtx).unwrap(),
            synthetic.hmtx().as_slice()
        );
    }

    #[test]
    fn test_load_glyph() {
        for long_loca in [false, true] {
            let synthetic = SyntheticFont {
                long_loca,
                ..SyntheticFont::default()
            };
            let data = synthetic.build();
            let reader = FontReader::new(&data).unwrap();

            for (index, glyph) in synthetic.glyphs.iter().enumerate() {
                let loaded = reader.load_glyph(index as u16).unwrap();
                // Short loca pads odd glyphs to an even length
                assert_eq!(&loaded[..glyph.len()], glyph.as_slice());
                assert!(loaded.len() - glyph.len() <= 1);
            }
            assert_eq!(reader.load_glyph(1).unwrap().len(), 0);
            assert!(matches!(
                reader.load_glyph(7),
                Err(SubsetError::Internal(InternalError::GlyphOutOfRange {
                    index: 7,
                    num_glyphs: 7
                }))
            ));
        }
    }

    #[test]
    fn test_horizontal_advance() {
        let synthetic = SyntheticFont::default();
        let data = synthetic.build();
        let reader = FontReader::new(&data).unwrap();

        for glyph_id in 0..reader.num_glyphs() {
            assert_eq!(
                reader.horizontal_advance(glyph_id).unwrap(),
                synthetic.advance(glyph_id)
            );
        }
        assert!(reader.horizontal_advance(7).is_err());
    }

    #[test]
    fn test_charcode_to_glyph_index() {
        let data = SyntheticFont::default().build();
        let reader = FontReader::new(&data).unwrap();

        assert_eq!(reader.charcode_to_glyph_index(0x41).unwrap(), 2);
        assert_eq!(reader.charcode_to_glyph_index(0xC5).unwrap(), 5);
        assert_eq!(reader.charcode_to_glyph_index(0x44).unwrap(), 0);
        assert_eq!(reader.charcode_to_glyph_index(0x1F600).unwrap(), 0);
        assert_eq!(
            reader.cmap_mappings().unwrap().into_iter().collect::<Vec<_>>(),
            vec![(0x20, 1), (0x41, 2), (0x42, 3), (0x43, 6), (0xC4, 4), (0xC5, 5)]
        );
    }

    #[test]
    fn test_missing_format4_subtable() {
        let synthetic = SyntheticFont::default();
        let mut tables = synthetic.tables();
        let cmap = tables.iter_mut().find(|(tag, _)| tag == b"cmap").unwrap();
        // Make the Windows record point at the format 0 subtable
        cmap.1[16..20].copy_from_slice(&20u32.to_be_bytes());
        let data = assemble(&tables);
        let reader = FontReader::new(&data).unwrap();

        assert!(matches!(
            reader.charcode_to_glyph_index(0x41),
            Err(SubsetError::Internal(InternalError::MissingCmapSubtable))
        ));
        assert!(reader.load_glyph(2).is_ok());
    }

    #[test]
    fn test_bad_magic() {
        let mut data = SyntheticFont::default().build();
        data[0..4].copy_from_slice(b"OTTO");
        assert_eq!(
            invalid_input(FontReader::new(&data)),
            InvalidInputError::BadMagic
        );

        let mut data = SyntheticFont::default().build();
        patch(&mut data, b"head", 12, &[0, 0, 0, 0]);
        assert_eq!(
            invalid_input(FontReader::new(&data)),
            InvalidInputError::BadMagic
        );
    }

    #[test]
    fn test_missing_table() {
        let data = SyntheticFont {
            omit: vec![b"hhea"],
            ..SyntheticFont::default()
        }
        .build();
        assert_eq!(
            invalid_input(FontReader::new(&data)),
            InvalidInputError::MissingTable(tag::HHEA)
        );
    }

    #[test]
    fn test_zero_length_table() {
        let data = SyntheticFont {
            extra_tables: vec![(*b"GSUB", Vec::new())],
            ..SyntheticFont::default()
        }
        .build();
        assert_eq!(
            invalid_input(FontReader::new(&data)),
            InvalidInputError::ZeroLengthTable(tag::from_string("GSUB").unwrap())
        );
    }

    #[test]
    fn test_wrong_fixed_size() {
        let synthetic = SyntheticFont::default();
        let mut tables = synthetic.tables();
        let maxp = tables.iter_mut().find(|(tag, _)| tag == b"maxp").unwrap();
        maxp.1.truncate(6);
        let data = assemble(&tables);
        assert_eq!(
            invalid_input(FontReader::new(&data)),
            InvalidInputError::TableSize {
                tag: tag::MAXP,
                expected: 32,
                actual: 6
            }
        );
    }

    #[test]
    fn test_inconsistent_loca() {
        let synthetic = SyntheticFont::default();
        let mut tables = synthetic.tables();
        let loca = tables.iter_mut().find(|(tag, _)| tag == b"loca").unwrap();
        loca.1.extend_from_slice(&[0, 0]);
        let data = assemble(&tables);
        assert_eq!(
            invalid_input(FontReader::new(&data)),
            InvalidInputError::InconsistentLoca
        );
    }

    #[test]
    fn test_table_outside_file() {
        let mut data = SyntheticFont::default().build();
        let len = data.len();
        data.truncate(len - 8);
        assert!(matches!(
            invalid_input(FontReader::new(&data)),
            InvalidInputError::Parse(ParseError::BadEof)
        ));
    }

    #[test]
    fn test_checksum_severity() {
        let mut data = SyntheticFont::default().build();
        // Change an OS/2 byte without fixing any checksum
        patch(&mut data, b"OS/2", 2, &[0x02, 0xBC]);

        let reader = FontReader::new(&data).unwrap();
        let diagnostics = reader.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert!(matches!(
            diagnostics[0],
            Diagnostic::FileChecksumMismatch { .. }
        ));
        assert!(matches!(
            diagnostics[1],
            Diagnostic::TableChecksumMismatch { tag: tag::OS_2, .. }
        ));

        let options = ReaderOptions {
            checksum_severity: Severity::Info,
        };
        let reader = FontReader::with_options(&data, &options).unwrap();
        assert_eq!(reader.diagnostics().len(), 2);

        let options = ReaderOptions {
            checksum_severity: Severity::Error,
        };
        assert!(matches!(
            invalid_input(FontReader::with_options(&data, &options)),
            InvalidInputError::ChecksumMismatch(Diagnostic::FileChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_head_checksum_ignores_adjustment() {
        let mut data = SyntheticFont::default().build();
        patch(&mut data, b"head", 8, &[1, 2, 3, 4]);
        let reader = FontReader::new(&data).unwrap();

        // Only the file checksum is affected
        assert_eq!(
            reader.diagnostics(),
            &[Diagnostic::FileChecksumMismatch {
                expected: reader_expected_adjustment(&data),
                actual: 0x01020304
            }]
        );
    }

    fn reader_expected_adjustment(data: &[u8]) -> u32 {
        let (head_offset, _) = find_table(data, b"head").unwrap();
        checksum::checksum_adjustment(data, head_offset).unwrap()
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic::TableChecksumMismatch {
            tag: tag::POST,
            expected: 0xABCD,
            actual: 1,
        };
        assert_eq!(
            diagnostic.to_string(),
            "'post' table checksum mismatch: expected 0x0000abcd, found 0x00000001"
        );
    }

    mod postscript_name {
        use super::*;

        fn name_of(synthetic: SyntheticFont) -> Result<String, SubsetError> {
            let data = synthetic.build();
            let reader = FontReader::new(&data)?;
            reader.postscript_name()
        }

        #[test]
        fn test_windows_preferred() {
            let synthetic = SyntheticFont {
                mac_postscript_name: Some("Mac-Name"),
                ..SyntheticFont::default()
            };
            assert_eq!(name_of(synthetic).unwrap(), "Synthetic-Regular");
        }

        #[test]
        fn test_mac_fallback() {
            let synthetic = SyntheticFont {
                windows_postscript_name: None,
                mac_postscript_name: Some("Mac-Name"),
                ..SyntheticFont::default()
            };
            assert_eq!(name_of(synthetic).unwrap(), "Mac-Name");
        }

        #[test]
        fn test_missing() {
            let synthetic = SyntheticFont {
                windows_postscript_name: None,
                ..SyntheticFont::default()
            };
            assert!(matches!(
                name_of(synthetic),
                Err(SubsetError::InvalidInput(
                    InvalidInputError::MissingPostscriptName
                ))
            ));
        }

        #[test]
        fn test_invalid_characters() {
            for name in ["Has Space", "Brace{", "Percent%", "Caf\u{e9}"] {
                let synthetic = SyntheticFont {
                    windows_postscript_name: Some(name),
                    ..SyntheticFont::default()
                };
                match name_of(synthetic) {
                    Err(SubsetError::InvalidInput(InvalidInputError::InvalidPostscriptName(
                        invalid,
                    ))) => assert_eq!(invalid, name),
                    other => panic!("{:?} accepted: {:?}", name, other.map_err(|e| e.to_string())),
                }
            }
        }

        #[test]
        fn test_unsupported_format() {
            let synthetic = SyntheticFont {
                name_format: 2,
                ..SyntheticFont::default()
            };
            assert!(matches!(
                name_of(synthetic),
                Err(SubsetError::InvalidInput(
                    InvalidInputError::UnsupportedNameFormat(2)
                ))
            ));
        }
    }
}
