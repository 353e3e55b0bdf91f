use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

const TYPE_MAP: u8 = 0x00;
const TYPE_STRING: u8 = 0x01;
const TYPE_U32: u8 = 0x02;
const TYPE_END: u8 = 0x08;

/// One decoded value from the binary shortcuts format. Maps keep entry
/// order; duplicate keys are preserved as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Map(Vec<(String, Field)>),
    Text(String),
    Number(u32),
}

pub type FieldMap = Vec<(String, Field)>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShortcutRecord {
    pub app_name: String,
    pub exe_path: String,
    pub explicit_app_id: Option<u64>,
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn byte(&mut self) -> Option<u8> {
        let byte = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn cstring(&mut self) -> Option<String> {
        let rest = &self.buf[self.pos.min(self.buf.len())..];
        let end = rest.iter().position(|byte| *byte == 0)?;
        let value = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += end + 1;
        Some(value)
    }

    fn u32_le(&mut self) -> Option<u32> {
        let end = self.pos.checked_add(4)?;
        let bytes: [u8; 4] = self.buf.get(self.pos..end)?.try_into().ok()?;
        self.pos = end;
        Some(u32::from_le_bytes(bytes))
    }
}

/// Decode the shortcut entries of a binary shortcuts buffer.
///
/// Tries the canonical wrapped shape first (a `0x00 "shortcuts"` root whose
/// entries are one nested map per shortcut), then falls back to reading the
/// buffer as a bare root map and collecting its map-valued entries. Malformed
/// input yields a partial or empty list, never an error.
pub fn parse_shortcut_maps(buf: &[u8]) -> Vec<FieldMap> {
    match parse_wrapped(buf) {
        Some(maps) => maps,
        None => parse_bare(buf),
    }
}

fn parse_wrapped(buf: &[u8]) -> Option<Vec<FieldMap>> {
    let mut cursor = Cursor::new(buf);
    if cursor.byte()? != TYPE_MAP {
        return None;
    }
    let key = cursor.cstring()?;
    if !key.eq_ignore_ascii_case("shortcuts") {
        return None;
    }
    Some(collect_maps(parse_map(&mut cursor)))
}

fn parse_bare(buf: &[u8]) -> Vec<FieldMap> {
    let mut cursor = Cursor::new(buf);
    collect_maps(parse_map(&mut cursor))
}

fn collect_maps(root: FieldMap) -> Vec<FieldMap> {
    root.into_iter()
        .filter_map(|(_, value)| match value {
            Field::Map(map) => Some(map),
            _ => None,
        })
        .collect()
}

fn parse_map(cursor: &mut Cursor) -> FieldMap {
    let mut entries = Vec::new();
    loop {
        let Some(type_byte) = cursor.byte() else {
            break;
        };
        if type_byte == TYPE_END {
            break;
        }
        // An unrecognized type byte ends the current map; whatever was
        // accumulated so far is returned as-is.
        if type_byte != TYPE_MAP && type_byte != TYPE_STRING && type_byte != TYPE_U32 {
            break;
        }
        let Some(key) = cursor.cstring() else {
            break;
        };
        let value = match type_byte {
            TYPE_MAP => Field::Map(parse_map(cursor)),
            TYPE_STRING => match cursor.cstring() {
                Some(text) => Field::Text(text),
                None => break,
            },
            _ => match cursor.u32_le() {
                Some(number) => Field::Number(number),
                None => break,
            },
        };
        entries.push((key, value));
    }
    entries
}

impl ShortcutRecord {
    /// Shortcut files in the wild mix key casing (`appname`/`AppName`,
    /// `exe`/`Exe`), so field lookup ignores ASCII case.
    pub fn from_map(map: &[(String, Field)]) -> Self {
        let mut record = ShortcutRecord::default();
        for (key, value) in map {
            if key.eq_ignore_ascii_case("appname") {
                if let Field::Text(text) = value {
                    record.app_name = text.clone();
                }
            } else if key.eq_ignore_ascii_case("exe") {
                if let Field::Text(text) = value {
                    record.exe_path = text.clone();
                }
            } else if key.eq_ignore_ascii_case("appid") {
                if let Field::Number(number) = value {
                    record.explicit_app_id = Some(u64::from(*number));
                }
            }
        }
        record
    }

    /// Register the ids this record is known under into the shared table.
    ///
    /// The explicit id (masked to 32 bits) and the legacy derived id
    /// (crc32 of exe path then app name, bit 31 set) are independent schemes
    /// and may both fire for one record.
    pub fn register_ids(&self, table: &mut HashMap<String, String>) {
        if let Some(raw) = self.explicit_app_id {
            let id = (raw & 0xFFFF_FFFF) as u32;
            table.insert(id.to_string(), self.app_name.clone());
        }
        if !self.app_name.is_empty() && !self.exe_path.is_empty() {
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(self.exe_path.as_bytes());
            hasher.update(self.app_name.as_bytes());
            let id = hasher.finalize() | 0x8000_0000;
            table.insert(id.to_string(), self.app_name.clone());
        }
    }
}

/// Build the appid -> name table from every user profile's shortcuts file
/// under each root's userdata directory. Roots without userdata contribute
/// nothing; a missing or unreadable shortcuts file is normal and skipped.
pub fn shortcut_names(roots: &[PathBuf], warnings: &mut Vec<String>) -> HashMap<String, String> {
    let mut table = HashMap::new();
    for root in roots {
        scan_userdata(&root.join("userdata"), &mut table, warnings);
    }
    table
}

fn scan_userdata(userdata: &Path, table: &mut HashMap<String, String>, warnings: &mut Vec<String>) {
    if !userdata.is_dir() {
        return;
    }
    for entry in WalkDir::new(userdata).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warnings.push(format!("userdata scan: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let vdf = entry.path().join("config").join("shortcuts.vdf");
        let bytes = match fs::read(&vdf) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        for map in parse_shortcut_maps(&bytes) {
            ShortcutRecord::from_map(&map).register_ids(table);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_map(buf: &mut Vec<u8>, key: &str) {
        buf.push(TYPE_MAP);
        buf.extend_from_slice(key.as_bytes());
        buf.push(0);
    }

    fn push_text(buf: &mut Vec<u8>, key: &str, value: &str) {
        buf.push(TYPE_STRING);
        buf.extend_from_slice(key.as_bytes());
        buf.push(0);
        buf.extend_from_slice(value.as_bytes());
        buf.push(0);
    }

    fn push_number(buf: &mut Vec<u8>, key: &str, value: u32) {
        buf.push(TYPE_U32);
        buf.extend_from_slice(key.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&value.to_le_bytes());
    }

    fn wrapped_two_shortcuts() -> Vec<u8> {
        let mut buf = Vec::new();
        open_map(&mut buf, "shortcuts");
        open_map(&mut buf, "0");
        push_number(&mut buf, "appid", 2887053680);
        push_text(&mut buf, "AppName", "Heroic");
        push_text(&mut buf, "Exe", "/usr/bin/heroic");
        buf.push(TYPE_END);
        open_map(&mut buf, "1");
        push_text(&mut buf, "appname", "Lutris");
        push_text(&mut buf, "exe", "/usr/bin/lutris");
        buf.push(TYPE_END);
        buf.push(TYPE_END);
        buf.push(TYPE_END);
        buf
    }

    #[test]
    fn parses_wrapped_shortcuts() {
        let maps = parse_shortcut_maps(&wrapped_two_shortcuts());
        assert_eq!(maps.len(), 2);

        let first = ShortcutRecord::from_map(&maps[0]);
        assert_eq!(first.app_name, "Heroic");
        assert_eq!(first.exe_path, "/usr/bin/heroic");
        assert_eq!(first.explicit_app_id, Some(2887053680));

        let second = ShortcutRecord::from_map(&maps[1]);
        assert_eq!(second.app_name, "Lutris");
        assert_eq!(second.explicit_app_id, None);
    }

    #[test]
    fn parses_bare_root_map() {
        let mut buf = Vec::new();
        open_map(&mut buf, "0");
        push_text(&mut buf, "appname", "Game");
        push_text(&mut buf, "exe", "/bin/game");
        buf.push(TYPE_END);
        buf.push(TYPE_END);

        let maps = parse_shortcut_maps(&buf);
        assert_eq!(maps.len(), 1);
        assert_eq!(ShortcutRecord::from_map(&maps[0]).app_name, "Game");
    }

    #[test]
    fn unknown_type_byte_yields_partial_map() {
        let mut buf = Vec::new();
        open_map(&mut buf, "0");
        push_text(&mut buf, "appname", "Game");
        buf.push(0x07);
        buf.extend_from_slice(b"junk\0junkjunk");

        let maps = parse_shortcut_maps(&buf);
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].len(), 1);
        assert_eq!(maps[0][0], ("appname".to_string(), Field::Text("Game".to_string())));
    }

    #[test]
    fn truncated_buffer_degrades_to_empty() {
        assert!(parse_shortcut_maps(&[]).is_empty());
        assert!(parse_shortcut_maps(&[TYPE_MAP]).is_empty());
        // A key with no terminating NUL cannot produce entries.
        assert!(parse_shortcut_maps(b"\x00shortcuts").is_empty());
    }

    #[test]
    fn invalid_utf8_key_is_replaced_not_fatal() {
        let mut buf = Vec::new();
        open_map(&mut buf, "shortcuts");
        buf.push(TYPE_MAP);
        buf.extend_from_slice(&[0x30, 0xFF, 0x00]);
        push_text(&mut buf, "appname", "Game");
        buf.push(TYPE_END);
        buf.push(TYPE_END);
        buf.push(TYPE_END);

        let maps = parse_shortcut_maps(&buf);
        assert_eq!(maps.len(), 1);
        assert_eq!(ShortcutRecord::from_map(&maps[0]).app_name, "Game");
    }

    #[test]
    fn derived_id_sets_bit_31_over_exe_then_name() {
        let record = ShortcutRecord {
            app_name: "Game".to_string(),
            exe_path: "/bin/game".to_string(),
            explicit_app_id: None,
        };
        let mut table = HashMap::new();
        record.register_ids(&mut table);

        let expected = crc32fast::hash(b"/bin/gameGame") | 0x8000_0000;
        assert_eq!(table.get(&expected.to_string()), Some(&"Game".to_string()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn explicit_id_is_masked_to_32_bits() {
        let record = ShortcutRecord {
            app_name: "Cycled".to_string(),
            exe_path: String::new(),
            explicit_app_id: Some(4294967296 + 7),
        };
        let mut table = HashMap::new();
        record.register_ids(&mut table);

        assert_eq!(table.get("7"), Some(&"Cycled".to_string()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn explicit_and_derived_ids_both_register() {
        let record = ShortcutRecord {
            app_name: "Game".to_string(),
            exe_path: "/bin/game".to_string(),
            explicit_app_id: Some(123456),
        };
        let mut table = HashMap::new();
        record.register_ids(&mut table);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("123456"), Some(&"Game".to_string()));
    }
}
