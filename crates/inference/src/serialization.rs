use serde::Serialize;
use std::io::{self, Write};

/// Write `value` as one JSON line and flush so the reading process sees it
/// immediately.
pub fn write_json_line<W: Write, T: Serialize>(mut writer: W, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
