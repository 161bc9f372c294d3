//! 图纸文字的规范化与解析工具，均为纯函数。

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};

use once_cell::sync::Lazy;
use regex::Regex;

/// 从左花括号到下一个分号的格式码，例如 `{\fArial|b0|i0;`。
static FORMAT_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^;]*;").expect("format code regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// 四段数字编号。每段前导零先被吞掉，捕获组只保留有效位。
static DELIMITED_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)0*(\d{1,2})-0*(\d{1,2})-0*(\d{1,3})-0*(\d{1,2})(?:$|\D)")
        .expect("delimited id regex")
});

static REVISION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[-_ .])R(?:EV)?[-_ ]?(\d+)(?:$|[-_ .])").expect("revision regex")
});

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+(?:\.\d+)?$").expect("number regex"));

static OFFSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d+(?:\.\d+)?)\s*([NSEW])$").expect("offset regex")
});

/// 去除格式码、折叠空白并转为大写。结果对自身再次规范化保持不变。
pub fn normalize(text: &str) -> String {
    let stripped = FORMAT_CODE.replace_all(text, "");
    let stripped = stripped.replace('}', "");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ");
    collapsed.to_uppercase()
}

/// 提取 `D{1,2}-D{1,2}-D{1,3}-D{1,2}` 形式的编号并去掉每段前导零。
///
/// 未找到时返回空串。调用方必须把空串视为“无法比较”，而不是与另一个空串相等。
pub fn extract_delimited_id(text: &str) -> String {
    let Some(captures) = DELIMITED_ID.captures(text) else {
        return String::new();
    };
    (1..=4)
        .filter_map(|group| captures.get(group))
        .map(|part| strip_leading_zeros(part.as_str()))
        .collect::<Vec<_>>()
        .join("-")
}

fn strip_leading_zeros(part: &str) -> &str {
    let trimmed = part.trim_start_matches('0');
    if trimmed.is_empty() { "0" } else { trimmed }
}

/// 轴号自然排序：先比较首字母，再按整数比较剩余部分，例如 `B2 < B10`。
/// 任一侧无法解析时退化为按字节比较。
pub fn natural_compare(a: &str, b: &str) -> Ordering {
    match (split_grid_label(a), split_grid_label(b)) {
        (Some((letter_a, number_a)), Some((letter_b, number_b))) => letter_a
            .cmp(&letter_b)
            .then_with(|| number_a.cmp(&number_b)),
        _ => a.cmp(b),
    }
}

fn split_grid_label(label: &str) -> Option<(char, u64)> {
    let mut chars = label.chars();
    let letter = chars.next()?;
    let number = chars.as_str().parse::<u64>().ok()?;
    Some((letter, number))
}

/// 从文件名中提取版次号（`REV05`、`R3`、`Rev-12` 等），去掉前导零。
pub fn extract_revision(file_name: &str) -> Option<u32> {
    REVISION
        .captures_iter(file_name)
        .filter_map(|captures| captures.get(1))
        .filter_map(|digits| digits.as_str().parse::<u32>().ok())
        .last()
}

/// 整段文字规范化后恰为一个十进制数时返回该数值。
pub fn parse_number(text: &str) -> Option<f64> {
    let normalized = normalize(text);
    if !NUMBER.is_match(&normalized) {
        return None;
    }
    normalized.parse::<f64>().ok()
}

/// 偏移量方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "N" => Some(Self::North),
            "S" => Some(Self::South),
            "E" => Some(Self::East),
            "W" => Some(Self::West),
            _ => None,
        }
    }

    pub fn letter(self) -> &'static str {
        match self {
            Self::North => "N",
            Self::South => "S",
            Self::East => "E",
            Self::West => "W",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

/// 解析 `"<数值> <方向>"` 形式的偏移文字，例如 `100.0 N`。
pub fn parse_offset(text: &str) -> Option<(f64, Direction)> {
    let normalized = normalize(text);
    let captures = OFFSET.captures(&normalized)?;
    let value = captures.get(1)?.as_str().parse::<f64>().ok()?;
    let direction = Direction::from_letter(captures.get(2)?.as_str())?;
    Some((value, direction))
}
