//! # Text Repair Filters
//!
//! PDF text extraction often leaves behind unmapped glyph codes (`(cid:72)`),
//! mirrored words and redaction tokens. These filters repair the common cases
//! before the text is shown to the user or sent to the model.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

static CID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(cid:(\d+)\)").expect("valid CID regex"));

/// Mirrored words seen in protocol PDFs, paired with their correct spelling.
const REVERSED_WORDS: &[(&str, &str)] = &[
    ("tuohsaW", "Washout"),
    ("doireP", "Period"),
    ("skeew", "weeks"),
    ("gnineercS", "Screening"),
    ("tisiV", "Visit"),
    ("gniwollof", "following"),
    ("tnesnoC", "Consent"),
    ("demrofnI", "Informed"),
    ("gnitseT", "Testing"),
    ("ycnangerP", "Pregnancy"),
    ("kcehC", "Check"),
    ("airetirC", "Criteria"),
    ("ytilibigilE", "Eligibility"),
    ("tneitap", "patient"),
    ("syaD", "Days"),
    ("motpmys", "symptom"),
    ("gnitroper", "reporting"),
    ("ylhtnom", "monthly"),
    ("yliaD", "Daily"),
    ("lawardhtiw", "withdrawal"),
    ("ylrae", "early"),
    ("enirU", "Urine"),
    ("ecnO", "Once"),
    ("reviL", "Liver"),
    ("weiveR", "Review"),
    ("lacisyhP", "Physical"),
    ("thgieW", "Weight"),
    ("thgieH", "Height"),
    ("sutats", "status"),
    ("nacs", "scan"),
    ("sisongaid", "diagnosis"),
    ("eugolana", "analogue"),
    ("nitatsotamos", "somatostatin"),
    ("smotpmys", "symptoms"),
    ("tnemtaert", "treatment"),
    ("sesylana", "analyses"),
    ("eerf", "free"),
    ("lleC", "Cell"),
    ("elpmas", "sample"),
    ("doolb", "blood"),
    ("gniliforp", "profiling"),
    ("cimoneg", "genomic"),
    ("eliforp", "profile"),
    ("ruoh", "hour"),
    ("ninargomorhC", "Chromogranin"),
    ("ninikorueN", "Neurokinin"),
    ("seriannoitseuQ", "Questionnaires"),
    ("tcejbuS", "Subject"),
    ("noitartsinimdA", "Administration"),
    ("noitacidem", "medication"),
    ("tnatimocnoC", "Concomitant"),
    ("lacigrus", "surgical"),
    ("seipareht", "therapies"),
    ("serudecorp", "procedures"),
    ("gurd", "drug"),
    ("tnevE", "Event"),
    ("esrevdA", "Adverse"),
    ("noitelpmoC", "Completion"),
];

/// The subset of mirrored words used to decide whether a text needs repair.
const REVERSED_MARKERS: &[&str] = &[
    "tuohsaW",
    "doireP",
    "skeew",
    "gnineercS",
    "tneitap",
    "enirU",
    "ecnO",
];

static REVERSED_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = REVERSED_WORDS
        .iter()
        .map(|(reversed, _)| regex::escape(reversed))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("valid reversed-word regex")
});

static REVERSED_LOOKUP: LazyLock<HashMap<String, &'static str>> = LazyLock::new(|| {
    REVERSED_WORDS
        .iter()
        .map(|(reversed, fixed)| (reversed.to_lowercase(), *fixed))
        .collect()
});

static PPD_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bPPD[ \t]*\n").expect("valid regex"));
static PPD_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bPPD\s+PPD\s*").expect("valid regex"));
static PPD_ISOLATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\s)PPD(\s)").expect("valid regex"));
static OT_TYPO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\s+ot\s+(\d+)\b").expect("valid regex"));
static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n").expect("valid regex"));
static SPACE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {3,}").expect("valid regex"));

/// The character for a known CID glyph code.
fn cid_char(code: u32) -> Option<&'static str> {
    let mapped = match code {
        3 | 13 | 32 => " ",
        8 => "%",
        9 => "\t",
        11 => "(",
        12 => ")",
        14 | 17 => ".",
        15 => ",",
        16 | 177 => "-",
        18 => "/",
        19 => "0",
        20 => "1",
        21 => "2",
        22 => "3",
        23 => "4",
        24 => "5",
        25 => "6",
        26 => "7",
        27 => "8",
        28 => "9",
        29 => ":",
        30 | 59 => ";",
        31 => "≤",
        33 => "!",
        34 | 63 => "?",
        36 => "A",
        37 => "B",
        38 => "C",
        39 => "D",
        40 => "E",
        41 => "F",
        42 => "G",
        43 => "H",
        44 => "I",
        45 => "J",
        46 => "K",
        47 => "L",
        48 => "M",
        49 => "N",
        50 => "O",
        51 => "P",
        52 => "Q",
        53 => "R",
        54 => "S",
        55 => "T",
        56 => "U",
        57 => "V",
        58 => "W",
        60 => "Y",
        61 => "Z",
        66 => "_",
        68 => "a",
        69 => "b",
        70 => "c",
        71 => "d",
        72 => "e",
        73 => "f",
        74 => "g",
        75 => "h",
        76 => "i",
        77 => "j",
        78 => "k",
        79 => "l",
        80 => "m",
        81 => "n",
        82 => "o",
        83 => "p",
        84 => "q",
        85 => "r",
        86 => "s",
        87 => "t",
        88 => "u",
        89 => "v",
        90 => "w",
        91 => "x",
        92 => "y",
        93 => "z",
        119 => "ï",
        120 => "•",
        138 => "®",
        147 => "±",
        179 | 180 => "\"",
        181 => "μ",
        182 => "'",
        _ => return None,
    };
    Some(mapped)
}

/// Replaces known `(cid:N)` glyph codes. Unknown codes are left in place.
pub fn decode_cid_codes(text: &str) -> String {
    CID_RE
        .replace_all(text, |caps: &Captures| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(cid_char)
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Replaces mirrored words with their correct spelling (whole words, any case).
pub fn fix_reversed_text(text: &str) -> String {
    REVERSED_RE
        .replace_all(text, |caps: &Captures| {
            let found = &caps[0];
            REVERSED_LOOKUP
                .get(&found.to_lowercase())
                .map(|fixed| fixed.to_string())
                .unwrap_or_else(|| found.to_string())
        })
        .into_owned()
}

/// Removes `PPD` redaction tokens and collapses excess whitespace.
pub fn clean_pdf_artifacts(text: &str) -> String {
    let text = PPD_LINE_RE.replace_all(text, "");
    let text = PPD_PAIR_RE.replace_all(&text, "");
    let text = PPD_ISOLATED_RE.replace_all(&text, "${1}${2}");
    let text = OT_TYPO_RE.replace_all(&text, "${1} to ${2}");
    let text = BLANK_LINES_RE.replace_all(&text, "\n\n");
    let text = SPACE_RUN_RE.replace_all(&text, "  ");
    text.into_owned()
}

/// Applies every repair filter in order.
pub fn repair_text(text: &str) -> String {
    let decoded = decode_cid_codes(text);
    let fixed = fix_reversed_text(&decoded);
    clean_pdf_artifacts(&fixed)
}

/// Counts the `(cid:N)` codes in a text.
pub fn count_cid_codes(text: &str) -> usize {
    CID_RE.find_iter(text).count()
}

/// A kind of extraction damage detected in a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextIssue {
    CidCodes,
    ReversedText,
    PdfArtifacts,
}

impl std::fmt::Display for TextIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TextIssue::CidCodes => "CID codes",
            TextIssue::ReversedText => "reversed text",
            TextIssue::PdfArtifacts => "PDF artifacts",
        };
        f.write_str(label)
    }
}

/// Reports which repairable problems are present in a text.
pub fn detect_text_issues(text: &str) -> Vec<TextIssue> {
    let mut issues = Vec::new();
    if text.contains("(cid:") {
        issues.push(TextIssue::CidCodes);
    }
    if REVERSED_MARKERS.iter().any(|word| text.contains(word)) {
        issues.push(TextIssue::ReversedText);
    }
    if text.matches("PPD").count() > 3 {
        issues.push(TextIssue::PdfArtifacts);
    }
    issues
}
