use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};

/// Format a date as a PDF date string (D:YYYYMMDDHHmmSSOHH'mm')
pub fn format_pdf_date(date: &DateTime<FixedOffset>) -> String {
    let formatted = date.format("D:%Y%m%d%H%M%S");
    let offset = date.offset().local_minus_utc();
    if offset == 0 {
        return format!("{formatted}Z");
    }
    let sign = if offset < 0 { '-' } else { '+' };
    let minutes = offset.abs() / 60;
    format!("{formatted}{sign}{:02}'{:02}'", minutes / 60, minutes % 60)
}

/// Parses `D:YYYY[MM[DD[HH[mm[SS[O[HH['mm[']]]]]]]]]`. Missing fields default
/// to their lowest value and a missing offset means UTC.
pub fn parse_pdf_date(bytes: &[u8]) -> Option<DateTime<FixedOffset>> {
    let rest = bytes.strip_prefix(b"D:")?;
    let mut cursor = DigitCursor { bytes: rest, pos: 0 };

    let year = cursor.take(4)? as i32;
    let month = cursor.take_or(2, 1)?;
    let day = cursor.take_or(2, 1)?;
    let hour = cursor.take_or(2, 0)?;
    let minute = cursor.take_or(2, 0)?;
    let second = cursor.take_or(2, 0)?;

    let offset_seconds = match cursor.next() {
        None | Some(b'Z') => 0,
        Some(sign @ (b'+' | b'-')) => {
            let hours = cursor.take_or(2, 0)? as i32;
            cursor.skip_apostrophe();
            let minutes = cursor.take_or(2, 0)? as i32;
            let total = hours * 3600 + minutes * 60;
            if sign == b'-' {
                -total
            } else {
                total
            }
        }
        Some(_) => return None,
    };

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    FixedOffset::east_opt(offset_seconds)?
        .from_local_datetime(&naive)
        .single()
}

struct DigitCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl DigitCursor<'_> {
    fn next(&mut self) -> Option<u8> {
        let b = self.bytes.get(self.pos).copied()?;
        self.pos += 1;
        Some(b)
    }

    fn take(&mut self, count: usize) -> Option<u32> {
        let digits = self.bytes.get(self.pos..self.pos + count)?;
        let mut value = 0u32;
        for &d in digits {
            if !d.is_ascii_digit() {
                return None;
            }
            value = value * 10 + u32::from(d - b'0');
        }
        self.pos += count;
        Some(value)
    }

    /// Reads a field when digits remain, `default` when the string ended.
    fn take_or(&mut self, count: usize, default: u32) -> Option<u32> {
        match self.bytes.get(self.pos) {
            Some(b) if b.is_ascii_digit() => self.take(count),
            _ => Some(default),
        }
    }

    fn skip_apostrophe(&mut self) {
        if self.bytes.get(self.pos) == Some(&b'\'') {
            self.pos += 1;
        }
    }
}
