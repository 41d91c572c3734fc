//! PDF Stream Filters
//!
//! Decoding of stream bodies according to ISO 32000-1 Section 7.4. Image
//! codecs (DCT, JPX, JBIG2, CCITT) are passed through by callers that want
//! the encoded bytes; asking to decode them is reported as unsupported.

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object};

#[cfg(feature = "compression")]
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
#[cfg(feature = "compression")]
use std::io::{Read, Write};

/// Supported PDF filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    ASCIIHexDecode,
    ASCII85Decode,
    LZWDecode,
    FlateDecode,
    RunLengthDecode,
    CCITTFaxDecode,
    JBIG2Decode,
    DCTDecode,
    JPXDecode,
    Crypt,
}

impl Filter {
    /// Parse filter from name, abbreviations used by inline images included
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "LZWDecode" | "LZW" => Some(Filter::LZWDecode),
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            "RunLengthDecode" | "RL" => Some(Filter::RunLengthDecode),
            "CCITTFaxDecode" | "CCF" => Some(Filter::CCITTFaxDecode),
            "JBIG2Decode" => Some(Filter::JBIG2Decode),
            "DCTDecode" | "DCT" => Some(Filter::DCTDecode),
            "JPXDecode" => Some(Filter::JPXDecode),
            "Crypt" => Some(Filter::Crypt),
            _ => None,
        }
    }
}

/// Decode stream data according to the dictionary's `/Filter` and
/// `/DecodeParms`
pub fn decode(data: &[u8], dict: &Dictionary) -> Result<Vec<u8>> {
    let filters: Vec<&str> = match dict.get("Filter") {
        None | Some(Object::Null) => return Ok(data.to_vec()),
        Some(Object::Name(name)) => vec![name.as_str()],
        Some(Object::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_name()
                    .ok_or_else(|| PdfError::Filter("Invalid filter in array".to_string()))
            })
            .collect::<Result<_>>()?,
        Some(other) => {
            return Err(PdfError::Filter(format!(
                "Invalid /Filter type {}",
                other.type_name()
            )));
        }
    };

    let params: Vec<Option<&Dictionary>> = match dict.get("DecodeParms") {
        Some(Object::Dictionary(params)) => vec![Some(params)],
        Some(Object::Array(items)) => items
            .iter()
            .map(|item| match item {
                Object::Dictionary(params) => Some(params),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut result = data.to_vec();
    for (i, name) in filters.into_iter().enumerate() {
        let filter = Filter::from_name(name)
            .ok_or_else(|| PdfError::Filter(format!("Unknown filter: {name}")))?;
        result = apply_filter(&result, filter, params.get(i).copied().flatten())?;
    }
    Ok(result)
}

fn apply_filter(data: &[u8], filter: Filter, params: Option<&Dictionary>) -> Result<Vec<u8>> {
    match filter {
        Filter::FlateDecode => {
            let inflated = decode_flate(data)?;
            match params {
                Some(params) => apply_predictor(inflated, params),
                None => Ok(inflated),
            }
        }
        Filter::ASCIIHexDecode => decode_ascii_hex(data),
        Filter::ASCII85Decode => decode_ascii85(data),
        Filter::RunLengthDecode => Ok(decode_run_length(data)),
        other => Err(PdfError::Unsupported(format!("{other:?} decoding"))),
    }
}

#[cfg(feature = "compression")]
fn decode_flate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut result = Vec::new();
    decoder
        .read_to_end(&mut result)
        .map_err(|e| PdfError::Filter(format!("Flate decode error: {e}")))?;
    Ok(result)
}

#[cfg(not(feature = "compression"))]
fn decode_flate(_data: &[u8]) -> Result<Vec<u8>> {
    Err(PdfError::Unsupported(
        "FlateDecode requires the 'compression' feature".to_string(),
    ))
}

/// Compress `data` with zlib for a `/FlateDecode` stream
#[cfg(feature = "compression")]
pub fn encode_flate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Undo a TIFF (2) or PNG (10..=15) predictor
fn apply_predictor(data: Vec<u8>, params: &Dictionary) -> Result<Vec<u8>> {
    let predictor = params.get_integer("Predictor").unwrap_or(1);
    if predictor <= 1 || data.is_empty() {
        return Ok(data);
    }

    let field = |key: &str, default: i64| {
        let value = params.get_integer(key).unwrap_or(default).max(1);
        usize::try_from(value).map_err(|_| PdfError::Filter(format!("/{key} {value} is too large")))
    };
    let colors = field("Colors", 1)?;
    let bits = field("BitsPerComponent", 8)?;
    let columns = field("Columns", 1)?;
    let overflow = || PdfError::Filter("Predictor row size overflows".to_string());
    let pixel_bits = colors.checked_mul(bits).ok_or_else(overflow)?;
    let bytes_per_pixel = pixel_bits.div_ceil(8);
    let row_length = pixel_bits
        .checked_mul(columns)
        .ok_or_else(overflow)?
        .div_ceil(8);
    if row_length > data.len() {
        return Err(PdfError::Filter(format!(
            "Predictor row of {row_length} bytes exceeds the {}-byte stream",
            data.len()
        )));
    }

    if predictor == 2 {
        return undo_tiff_predictor(data, bits, bytes_per_pixel, row_length);
    }

    let mut output = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_length];
    for chunk in data.chunks(row_length + 1) {
        let (&kind, row) = chunk
            .split_first()
            .ok_or_else(|| PdfError::Filter("Empty predictor row".to_string()))?;
        let mut current = row.to_vec();
        current.resize(row_length, 0);

        for i in 0..row_length {
            let left = if i >= bytes_per_pixel { current[i - bytes_per_pixel] } else { 0 };
            let up = previous[i];
            let upper_left = if i >= bytes_per_pixel { previous[i - bytes_per_pixel] } else { 0 };
            let predicted = match kind {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, upper_left),
                other => {
                    return Err(PdfError::Filter(format!("Invalid PNG row filter {other}")));
                }
            };
            current[i] = current[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&current[..row.len().min(row_length)]);
        previous = current;
    }
    Ok(output)
}

/// TIFF horizontal differencing, 8-bit components only
fn undo_tiff_predictor(
    mut data: Vec<u8>,
    bits: usize,
    bytes_per_pixel: usize,
    row_length: usize,
) -> Result<Vec<u8>> {
    if bits != 8 {
        return Err(PdfError::Unsupported(format!(
            "TIFF predictor with {bits} bits per component"
        )));
    }
    for row in data.chunks_mut(row_length) {
        for i in bytes_per_pixel..row.len() {
            row[i] = row[i].wrapping_add(row[i - bytes_per_pixel]);
        }
    }
    Ok(data)
}

fn paeth(left: u8, up: u8, upper_left: u8) -> u8 {
    let p = i16::from(left) + i16::from(up) - i16::from(upper_left);
    let pa = (p - i16::from(left)).abs();
    let pb = (p - i16::from(up)).abs();
    let pc = (p - i16::from(upper_left)).abs();
    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        upper_left
    }
}

fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

fn decode_ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;
    for &ch in data {
        if ch == b'>' {
            break;
        }
        if ch.is_ascii_whitespace() {
            continue;
        }
        let value = hex_digit_value(ch)
            .ok_or_else(|| PdfError::Filter(format!("Invalid hex digit: {}", ch as char)))?;
        match high.take() {
            Some(h) => result.push(h << 4 | value),
            None => high = Some(value),
        }
    }
    // Odd number of digits: pad with 0
    if let Some(h) = high {
        result.push(h << 4);
    }
    Ok(result)
}

fn decode_ascii85(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = Vec::with_capacity(5);
    let body = data.strip_prefix(b"<~").unwrap_or(data);

    let group_value = |group: &[u8]| -> Result<u32> {
        let value = group
            .iter()
            .fold(0u64, |acc, &ch| acc * 85 + u64::from(ch - b'!'));
        u32::try_from(value).map_err(|_| PdfError::Filter("ASCII85 group overflow".to_string()))
    };

    let mut iter = body.iter().copied().filter(|b| !b.is_ascii_whitespace());
    while let Some(c) = iter.next() {
        match c {
            b'~' => {
                if iter.next() != Some(b'>') {
                    return Err(PdfError::Filter("Invalid ASCII85 end marker".to_string()));
                }
                break;
            }
            b'z' if group.is_empty() => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group.push(c);
                if group.len() == 5 {
                    result.extend_from_slice(&group_value(&group)?.to_be_bytes());
                    group.clear();
                }
            }
            other => {
                return Err(PdfError::Filter(format!(
                    "Invalid ASCII85 character: {}",
                    other as char
                )));
            }
        }
    }

    if !group.is_empty() {
        let encoded = group.len();
        group.resize(5, b'u');
        let bytes = group_value(&group)?.to_be_bytes();
        result.extend_from_slice(&bytes[..encoded - 1]);
    }
    Ok(result)
}

fn decode_run_length(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let end = (i + length as usize + 1).min(data.len());
                result.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                if let Some(&byte) = data.get(i) {
                    result.extend(std::iter::repeat(byte).take(257 - length as usize));
                }
                i += 1;
            }
        }
    }
    result
}
