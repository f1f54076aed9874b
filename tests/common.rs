use std::collections::BTreeMap;
use std::num::Wrapping;

/// A small TrueType font assembled from scratch for tests.
///
/// The default font has seven glyphs:
///
/// | glyph | content                  | code point |
/// |-------|--------------------------|------------|
/// | 0     | simple (.notdef)         |            |
/// | 1     | empty (space)            | U+0020     |
/// | 2     | simple                   | U+0041     |
/// | 3     | simple                   | U+0042     |
/// | 4     | composite of 2 and 3     | U+00C4     |
/// | 5     | composite of 4           | U+00C5     |
/// | 6     | simple                   | U+0043     |
#[derive(Clone, Debug)]
pub struct SyntheticFont {
    pub glyphs: Vec<Vec<u8>>,
    pub mappings: BTreeMap<u16, u16>,
    pub num_h_metrics: u16,
    pub long_loca: bool,
    pub windows_postscript_name: Option<&'static str>,
    pub mac_postscript_name: Option<&'static str>,
    pub name_format: u16,
    /// Tables left out of the font.
    pub omit: Vec<&'static [u8; 4]>,
    /// Tables added as is, such as `cvt `, `fpgm` and `prep`.
    pub extra_tables: Vec<([u8; 4], Vec<u8>)>,
    /// Write a version 2 `post` table with glyph names.
    pub post_glyph_names: bool,
}

impl Default for SyntheticFont {
    fn default() -> Self {
        let glyphs = vec![
            simple_glyph(500),
            Vec::new(),
            simple_glyph(600),
            simple_glyph(610),
            composite_glyph(&[2, 3]),
            composite_glyph(&[4]),
            simple_glyph(620),
        ];
        let mappings = [(0x20, 1), (0x41, 2), (0x42, 3), (0x43, 6), (0xC4, 4), (0xC5, 5)]
            .into_iter()
            .collect();
        SyntheticFont {
            glyphs,
            mappings,
            num_h_metrics: 4,
            long_loca: false,
            windows_postscript_name: Some("Synthetic-Regular"),
            mac_postscript_name: None,
            name_format: 0,
            omit: Vec::new(),
            extra_tables: Vec::new(),
            post_glyph_names: true,
        }
    }
}

impl SyntheticFont {
    pub fn num_glyphs(&self) -> u16 {
        self.glyphs.len() as u16
    }

    /// The tables of the font, sorted by tag.
    pub fn tables(&self) -> Vec<([u8; 4], Vec<u8>)> {
        let (loca, glyf) = self.loca_glyf();
        let mut tables = vec![
            (*b"OS/2", self.os2()),
            (*b"cmap", self.cmap()),
            (*b"glyf", glyf),
            (*b"head", self.head()),
            (*b"hhea", self.hhea()),
            (*b"hmtx", self.hmtx()),
            (*b"loca", loca),
            (*b"maxp", self.maxp()),
            (*b"name", self.name()),
            (*b"post", self.post()),
        ];
        tables.extend(self.extra_tables.iter().cloned());
        tables.retain(|(tag, _)| !self.omit.iter().any(|omit| *omit == tag));
        tables.sort_by(|a, b| a.0.cmp(&b.0));
        tables
    }

    pub fn build(&self) -> Vec<u8> {
        assemble(&self.tables())
    }

    /// Advance width of `glyph_id` as stored in `hmtx`.
    pub fn advance(&self, glyph_id: u16) -> u16 {
        500 + 10 * glyph_id.min(self.num_h_metrics - 1)
    }

    pub fn head(&self) -> Vec<u8> {
        let mut data = Vec::new();
        push_u16(&mut data, 1); // majorVersion
        push_u16(&mut data, 0); // minorVersion
        push_u32(&mut data, 0x00010000); // fontRevision
        push_u32(&mut data, 0); // checkSumAdjustment
        push_u32(&mut data, 0x5F0F3CF5); // magicNumber
        push_u16(&mut data, 0b1011); // flags
        push_u16(&mut data, 1000); // unitsPerEm
        data.extend_from_slice(&3_600_000_000i64.to_be_bytes()); // created
        data.extend_from_slice(&3_700_000_000i64.to_be_bytes()); // modified
        push_i16(&mut data, 0); // xMin
        push_i16(&mut data, -200); // yMin
        push_i16(&mut data, 620); // xMax
        push_i16(&mut data, 800); // yMax
        push_u16(&mut data, 0); // macStyle
        push_u16(&mut data, 8); // lowestRecPPEM
        push_i16(&mut data, 2); // fontDirectionHint
        push_i16(&mut data, i16::from(self.long_loca)); // indexToLocFormat
        push_i16(&mut data, 0); // glyphDataFormat
        data
    }

    pub fn hhea(&self) -> Vec<u8> {
        let mut data = Vec::new();
        push_u16(&mut data, 1); // majorVersion
        push_u16(&mut data, 0); // minorVersion
        push_i16(&mut data, 800); // ascender
        push_i16(&mut data, -200); // descender
        push_i16(&mut data, 90); // lineGap
        push_u16(&mut data, self.advance(self.num_glyphs() - 1)); // advanceWidthMax
        push_i16(&mut data, 0); // minLeftSideBearing
        push_i16(&mut data, 0); // minRightSideBearing
        push_i16(&mut data, 620); // xMaxExtent
        push_i16(&mut data, 1); // caretSlopeRise
        push_i16(&mut data, 0); // caretSlopeRun
        push_i16(&mut data, 0); // caretOffset
        for _ in 0..4 {
            push_i16(&mut data, 0); // reserved
        }
        push_i16(&mut data, 0); // metricDataFormat
        push_u16(&mut data, self.num_h_metrics);
        data
    }

    pub fn maxp(&self) -> Vec<u8> {
        let mut data = Vec::new();
        push_u32(&mut data, 0x00010000);
        push_u16(&mut data, self.num_glyphs());
        // maxPoints through maxComponentDepth
        for value in [3, 1, 6, 2, 2, 0, 0, 0, 0, 64, 0, 2, 2] {
            push_u16(&mut data, value);
        }
        data
    }

    pub fn hmtx(&self) -> Vec<u8> {
        let mut data = Vec::new();
        for glyph_id in 0..self.num_h_metrics {
            push_u16(&mut data, self.advance(glyph_id));
            push_i16(&mut data, glyph_id as i16);
        }
        for glyph_id in self.num_h_metrics..self.num_glyphs() {
            push_i16(&mut data, glyph_id as i16);
        }
        data
    }

    pub fn post(&self) -> Vec<u8> {
        let mut data = Vec::new();
        let version = if self.post_glyph_names {
            0x00020000
        } else {
            0x00030000
        };
        push_u32(&mut data, version);
        push_u32(&mut data, 0xFFF48000); // italicAngle -11.5
        push_i16(&mut data, -100); // underlinePosition
        push_i16(&mut data, 50); // underlineThickness
        push_u32(&mut data, 1); // isFixedPitch
        for mem in [10, 20, 30, 40] {
            push_u32(&mut data, mem);
        }
        if self.post_glyph_names {
            push_u16(&mut data, self.num_glyphs());
            for glyph_id in 0..self.num_glyphs() {
                push_u16(&mut data, glyph_id);
            }
        }
        data
    }

    pub fn os2(&self) -> Vec<u8> {
        let mut data = Vec::new();
        push_u16(&mut data, 0); // version
        push_i16(&mut data, 550); // xAvgCharWidth
        push_u16(&mut data, 400); // usWeightClass
        push_u16(&mut data, 5); // usWidthClass
        data.resize(78, 0);
        data
    }

    pub fn name(&self) -> Vec<u8> {
        let mut records = Vec::new();
        let mut storage = Vec::new();
        if let Some(name) = self.mac_postscript_name {
            records.push((1, 0, 0, 6, storage.len(), name.len()));
            storage.extend_from_slice(name.as_bytes());
        }
        if let Some(name) = self.windows_postscript_name {
            let utf16 = name
                .encode_utf16()
                .flat_map(|unit| unit.to_be_bytes())
                .collect::<Vec<u8>>();
            records.push((3, 1, 0x409, 6, storage.len(), utf16.len()));
            storage.extend(utf16);
        }
        // An unrelated record
        records.push((3, 1, 0x409, 1, storage.len(), 2));
        storage.extend_from_slice(&[0, b'S']);

        let mut data = Vec::new();
        push_u16(&mut data, self.name_format);
        push_u16(&mut data, records.len() as u16);
        push_u16(&mut data, (6 + 12 * records.len()) as u16);
        for (platform, encoding, language, name_id, offset, length) in records {
            push_u16(&mut data, platform);
            push_u16(&mut data, encoding);
            push_u16(&mut data, language);
            push_u16(&mut data, name_id);
            push_u16(&mut data, length as u16);
            push_u16(&mut data, offset as u16);
        }
        data.extend(storage);
        data
    }

    /// A Mac Roman record that is not format 4 followed by a Windows Unicode format 4 subtable
    /// with one segment per mapping.
    pub fn cmap(&self) -> Vec<u8> {
        let format4 = format4_subtable(&self.mappings);
        let mut data = Vec::new();
        push_u16(&mut data, 0); // version
        push_u16(&mut data, 2); // numTables
        push_u16(&mut data, 1);
        push_u16(&mut data, 0);
        push_u32(&mut data, 20);
        push_u16(&mut data, 3);
        push_u16(&mut data, 1);
        push_u32(&mut data, 20 + 262);
        // format 0, Mac Roman
        push_u16(&mut data, 0);
        push_u16(&mut data, 262);
        push_u16(&mut data, 0);
        data.extend_from_slice(&[0; 256]);
        data.extend(format4);
        data
    }

    /// Returns `(loca, glyf)`.
    pub fn loca_glyf(&self) -> (Vec<u8>, Vec<u8>) {
        let mut glyf = Vec::new();
        let mut offsets = vec![0];
        for glyph in &self.glyphs {
            glyf.extend_from_slice(glyph);
            if !self.long_loca && glyf.len() % 2 == 1 {
                glyf.push(0);
            }
            offsets.push(glyf.len());
        }
        let mut loca = Vec::new();
        for offset in offsets {
            if self.long_loca {
                push_u32(&mut loca, offset as u32);
            } else {
                push_u16(&mut loca, (offset / 2) as u16);
            }
        }
        (loca, glyf)
    }
}

/// A single contour triangle. The length is odd (29 bytes).
pub fn simple_glyph(x_max: i16) -> Vec<u8> {
    let mut data = Vec::new();
    push_i16(&mut data, 1); // numberOfContours
    push_i16(&mut data, 0);
    push_i16(&mut data, 0);
    push_i16(&mut data, x_max);
    push_i16(&mut data, 700);
    push_u16(&mut data, 2); // endPtsOfContours
    push_u16(&mut data, 0); // instructionLength
    data.extend_from_slice(&[1, 1, 1]); // flags: on curve, word coordinates
    for x in [0, x_max / 2, x_max] {
        push_i16(&mut data, x);
    }
    for y in [0, 700, 0] {
        push_i16(&mut data, y);
    }
    data
}

/// A composite glyph placing each of `components` with word sized x/y offsets.
pub fn composite_glyph(components: &[u16]) -> Vec<u8> {
    let mut data = Vec::new();
    push_i16(&mut data, -1); // numberOfContours
    push_i16(&mut data, 0);
    push_i16(&mut data, 0);
    push_i16(&mut data, 620);
    push_i16(&mut data, 900);
    for (index, &glyph_index) in components.iter().enumerate() {
        let more_components = if index + 1 < components.len() {
            0x0020
        } else {
            0
        };
        // ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES
        push_u16(&mut data, 0x0001 | 0x0002 | more_components);
        push_u16(&mut data, glyph_index);
        push_i16(&mut data, 10 * index as i16);
        push_i16(&mut data, 0);
    }
    data
}

/// A format 4 subtable with one delta segment per mapping.
pub fn format4_subtable(mappings: &BTreeMap<u16, u16>) -> Vec<u8> {
    let seg_count = mappings.len() + 1;
    let mut end_codes = Vec::new();
    let mut start_codes = Vec::new();
    let mut id_deltas = Vec::new();
    for (&code, &glyph_id) in mappings {
        end_codes.push(code);
        start_codes.push(code);
        id_deltas.push(glyph_id.wrapping_sub(code));
    }
    end_codes.push(0xFFFF);
    start_codes.push(0xFFFF);
    id_deltas.push(1);

    let entry_selector = (usize::BITS - 1 - seg_count.leading_zeros()) as u16;
    let search_range = 2 << entry_selector;
    let mut data = Vec::new();
    push_u16(&mut data, 4); // format
    push_u16(&mut data, (16 + 8 * seg_count) as u16); // length
    push_u16(&mut data, 0); // language
    push_u16(&mut data, (2 * seg_count) as u16);
    push_u16(&mut data, search_range);
    push_u16(&mut data, entry_selector);
    push_u16(&mut data, (2 * seg_count) as u16 - search_range);
    end_codes.iter().for_each(|&code| push_u16(&mut data, code));
    push_u16(&mut data, 0); // reservedPad
    start_codes.iter().for_each(|&code| push_u16(&mut data, code));
    id_deltas.iter().for_each(|&delta| push_u16(&mut data, delta));
    (0..seg_count).for_each(|_| push_u16(&mut data, 0)); // idRangeOffset
    data
}

/// Wrap `tables` in an sfnt container with valid checksums.
///
/// Tables are written in the order given.
pub fn assemble(tables: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let num_tables = tables.len() as u16;
    let entry_selector = 15 - num_tables.leading_zeros() as u16;
    let search_range = 16 << entry_selector;

    let mut font = Vec::new();
    push_u32(&mut font, 0x00010000);
    push_u16(&mut font, num_tables);
    push_u16(&mut font, search_range);
    push_u16(&mut font, entry_selector);
    push_u16(&mut font, num_tables * 16 - search_range);

    let mut offset = 12 + 16 * tables.len();
    let mut head_offset = None;
    for (tag, data) in tables {
        let checksum = if tag == b"head" {
            head_offset = Some(offset);
            let mut head = data.clone();
            head[8..12].copy_from_slice(&[0; 4]);
            checksum(&head)
        } else {
            checksum(data)
        };
        font.extend_from_slice(tag);
        push_u32(&mut font, checksum);
        push_u32(&mut font, offset as u32);
        push_u32(&mut font, data.len() as u32);
        offset += (data.len() + 3) / 4 * 4;
    }
    for (tag, data) in tables {
        if tag == b"head" {
            let mut head = data.clone();
            head[8..12].copy_from_slice(&[0; 4]);
            font.extend(head);
        } else {
            font.extend_from_slice(data);
        }
        font.resize((font.len() + 3) / 4 * 4, 0);
    }

    if let Some(head_offset) = head_offset {
        let adjustment = 0xB1B0AFBAu32.wrapping_sub(checksum(&font));
        font[head_offset + 8..head_offset + 12].copy_from_slice(&adjustment.to_be_bytes());
    }
    font
}

/// The OpenType checksum of `data`, zero padding a trailing partial word.
pub fn checksum(data: &[u8]) -> u32 {
    data.chunks(4)
        .map(|chunk| {
            let mut word = [0; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            Wrapping(u32::from_be_bytes(word))
        })
        .sum::<Wrapping<u32>>()
        .0
}

/// Find the `(offset, length)` of table `tag` in `font`.
pub fn find_table(font: &[u8], tag: &[u8; 4]) -> Option<(usize, usize)> {
    let num_tables = usize::from(u16::from_be_bytes([font[4], font[5]]));
    (0..num_tables).find_map(|index| {
        let record = &font[12 + 16 * index..28 + 16 * index];
        if &record[..4] == tag {
            let offset = u32::from_be_bytes([record[8], record[9], record[10], record[11]]);
            let length = u32::from_be_bytes([record[12], record[13], record[14], record[15]]);
            Some((offset as usize, length as usize))
        } else {
            None
        }
    })
}

pub fn table_data<'a>(font: &'a [u8], tag: &[u8; 4]) -> Option<&'a [u8]> {
    find_table(font, tag).map(|(offset, length)| &font[offset..offset + length])
}

/// The data of every glyph in `font`, read directly from `loca` and `glyf`.
///
/// Works for fonts without a `cmap` and for fonts whose `glyf` was left out.
pub fn glyph_data(font: &[u8]) -> Vec<&[u8]> {
    let head = table_data(font, b"head").unwrap();
    let maxp = table_data(font, b"maxp").unwrap();
    let loca = table_data(font, b"loca").unwrap();
    let glyf = table_data(font, b"glyf").unwrap_or(&[]);
    let long_loca = head[50..52] != [0, 0];
    let num_glyphs = usize::from(u16::from_be_bytes([maxp[4], maxp[5]]));

    let offsets = if long_loca {
        loca.chunks(4)
            .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize)
            .collect::<Vec<_>>()
    } else {
        loca.chunks(2)
            .map(|chunk| usize::from(u16::from_be_bytes([chunk[0], chunk[1]])) * 2)
            .collect::<Vec<_>>()
    };
    assert_eq!(offsets.len(), num_glyphs + 1);
    offsets
        .windows(2)
        .map(|pair| &glyf[pair[0]..pair[1]])
        .collect()
}

fn push_u16(data: &mut Vec<u8>, value: u16) {
    data.extend_from_slice(&value.to_be_bytes());
}

fn push_i16(data: &mut Vec<u8>, value: i16) {
    data.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(data: &mut Vec<u8>, value: u32) {
    data.extend_from_slice(&value.to_be_bytes());
}
