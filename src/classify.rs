//! Attribute extraction for security-bulletin titles and filenames
//!
//! Bulletin titles look like `July 2021 Windows 10 Version 21H1 (KB5004237)`
//! and filenames like `windows10.0-kb5004237-x64_6e8e4a0a8b.msu`. Everything
//! here is substring heuristics over those conventions, evaluated as ordered
//! rule tables where the first matching rule wins.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X64,
    Arm64,
    X86,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Architecture::X64 => "x64",
            Architecture::Arm64 => "arm64",
            Architecture::X86 => "x86",
        })
    }
}

/// Matches when any marker occurs (case-insensitively) in the title or filename.
#[derive(Debug)]
pub struct ArchitectureRule {
    pub markers: &'static [&'static str],
    pub architecture: Architecture,
}

impl ArchitectureRule {
    pub fn matches(&self, title: &str, filename: &str) -> bool {
        let title = title.to_lowercase();
        let filename = filename.to_lowercase();
        self.markers
            .iter()
            .any(|m| title.contains(m) || filename.contains(m))
    }
}

pub static ARCHITECTURE_RULES: &[ArchitectureRule] = &[
    ArchitectureRule {
        markers: &["x64", "-x64_", "64-bit"],
        architecture: Architecture::X64,
    },
    ArchitectureRule {
        markers: &["arm64"],
        architecture: Architecture::Arm64,
    },
    ArchitectureRule {
        markers: &["x86", "32-bit"],
        architecture: Architecture::X86,
    },
];

/// Matches when every substring occurs in the title.
#[derive(Debug)]
pub struct ProductRule {
    pub all: &'static [&'static str],
    pub product: &'static str,
}

impl ProductRule {
    pub fn matches(&self, title: &str) -> bool {
        self.all.iter().all(|s| title.contains(s))
    }
}

const fn product(all: &'static [&'static str], product: &'static str) -> ProductRule {
    ProductRule { all, product }
}

// Versioned entries sit above the family entry they refine.
pub static OS_RULES: &[ProductRule] = &[
    product(&["Windows 10", "1507"], "Windows 10 Version 1507"),
    product(&["Windows 10", "1607"], "Windows 10 Version 1607"),
    product(&["Windows 10", "1703"], "Windows 10 Version 1703"),
    product(&["Windows 10", "1709"], "Windows 10 Version 1709"),
    product(&["Windows 10", "1803"], "Windows 10 Version 1803"),
    product(&["Windows 10", "1809"], "Windows 10 Version 1809"),
    product(&["Windows 10", "1903"], "Windows 10 Version 1903"),
    product(&["Windows 10", "1909"], "Windows 10 Version 1909"),
    product(&["Windows 10", "2004"], "Windows 10 Version 2004"),
    product(&["Windows 10", "20H2"], "Windows 10 Version 20H2"),
    product(&["Windows 10", "21H1"], "Windows 10 Version 21H1"),
    product(&["Windows 10", "21H2"], "Windows 10 Version 21H2"),
    product(&["Windows 10", "22H2"], "Windows 10 Version 22H2"),
    product(&["Windows 10"], "Windows 10"),
    product(&["Windows 11", "21H2"], "Windows 11 Version 21H2"),
    product(&["Windows 11", "22H2"], "Windows 11 Version 22H2"),
    product(&["Windows 11", "23H2"], "Windows 11 Version 23H2"),
    product(&["Windows 11"], "Windows 11"),
    product(&["Windows Server", "1809"], "Windows Server, version 1809"),
    product(&["Windows Server", "1903"], "Windows Server, version 1903"),
    product(&["Windows Server", "1909"], "Windows Server, version 1909"),
    product(&["Windows Server", "2004"], "Windows Server, version 2004"),
    product(&["Windows Server", "20H2"], "Windows Server, version 20H2"),
    product(&["Windows Server", "2022"], "Windows Server 2022"),
    product(&["Windows Server", "2019"], "Windows Server 2019"),
    product(&["Windows Server", "2016"], "Windows Server 2016"),
    product(&["Windows Server", "2012 R2"], "Windows Server 2012 R2"),
    product(&["Windows Server", "2012"], "Windows Server 2012"),
    product(&["Windows Server", "2008 R2"], "Windows Server 2008 R2"),
    product(&["Windows Server", "2008"], "Windows Server 2008"),
    product(&["Windows Server"], "Windows Server"),
    product(&["Windows 8.1"], "Windows 8.1"),
    product(&["Windows RT 8.1"], "Windows RT 8.1"),
    product(&["Windows 7"], "Windows 7"),
];

// Consulted only when no OS rule matched.
pub static APPLICATION_RULES: &[ProductRule] = &[
    product(&[".NET Core"], ".NET Core"),
    product(&[".NET"], ".NET Framework"),
    product(&["Excel"], "Excel"),
    product(&["SharePoint"], "SharePoint"),
    product(&["Word"], "Word"),
    product(&["Office"], "Office"),
    product(&["Edge"], "Edge"),
    product(&["Malicious Software Removal Tool"], "Malicious Software Removal Tool"),
    product(&["Exchange"], "Exchange"),
    product(&["Azure Stack"], "Azure Stack"),
];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub architecture: Option<Architecture>,
    pub product: Option<String>,
    pub kb: Option<String>,
    pub guid: Option<String>,
    pub disa_date: Option<String>,
    pub clean_title: String,
}

pub fn classify(title: &str, filename: &str) -> Classification {
    let (disa_date, undated) = split_leading_date(title);
    let kb = kb_number(title);

    let mut clean_title = undated.to_string();
    if let Some(kb) = &kb {
        clean_title = clean_title.replace(&format!(" (KB{kb})"), "");
    }

    Classification {
        architecture: architecture(title, filename),
        product: product_for(undated).map(str::to_string),
        kb,
        guid: guid_label(filename),
        disa_date: disa_date.map(str::to_string),
        clean_title: clean_title.trim().to_string(),
    }
}

pub fn architecture(title: &str, filename: &str) -> Option<Architecture> {
    ARCHITECTURE_RULES
        .iter()
        .find(|r| r.matches(title, filename))
        .map(|r| r.architecture)
}

pub fn product_for(title: &str) -> Option<&'static str> {
    OS_RULES
        .iter()
        .find(|r| r.matches(title))
        .or_else(|| APPLICATION_RULES.iter().find(|r| r.matches(title)))
        .map(|r| r.product)
}

/// The number inside `(KB...)`, if it is made only of digits and dots.
pub fn kb_number(title: &str) -> Option<String> {
    if !title.contains("KB") {
        return None;
    }
    let start = title.find("(KB")? + "(KB".len();
    let rest = &title[start..];
    let token = &rest[..rest.find(')')?];

    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    Some(token.to_string())
}

/// Label taken from the filename: after the last `_`, up to the first `.`.
pub fn guid_label(filename: &str) -> Option<String> {
    let (_, tail) = filename.rsplit_once('_')?;
    let label = tail.split('.').next().unwrap_or_default();
    (!label.is_empty()).then(|| label.to_string())
}

/// Split a leading `Month [Year]` or `YYYY-MM` token off a title.
///
/// Returns the date token used as the DISA date (the month name, or the
/// `YYYY-MM` token) and the remainder of the title.
pub fn split_leading_date(title: &str) -> (Option<&str>, &str) {
    let title = title.trim_start();
    let (first, rest) = title.split_once(' ').unwrap_or((title, ""));

    if MONTHS.iter().any(|m| m.eq_ignore_ascii_case(first)) {
        let rest = rest.trim_start();
        let rest = match rest.split_once(' ') {
            Some((year, tail)) if is_year(year) => tail,
            None if is_year(rest) => "",
            _ => rest,
        };
        return (Some(first), rest.trim_start());
    }

    if is_year_month(first) {
        return (Some(first), rest.trim_start());
    }

    (None, title)
}

fn is_year(token: &str) -> bool {
    token.len() == 4 && token.chars().all(|c| c.is_ascii_digit())
}

fn is_year_month(token: &str) -> bool {
    match token.split_once('-') {
        Some((year, month)) => {
            is_year(year) && month.len() == 2 && month.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_10_21h1_bulletin() {
        let c = classify(
            "July 2021 Windows 10 Version 21H1 (KB5004237)",
            "windows10.0-kb5004237-x64_3cf1d6f8a5d0f7a2d3e2e6e0c8bbd7b0a1c2d3e4.msu",
        );
        assert_eq!(c.product.as_deref(), Some("Windows 10 Version 21H1"));
        assert_eq!(c.kb.as_deref(), Some("5004237"));
        assert_eq!(c.disa_date.as_deref(), Some("July"));
        assert_eq!(c.clean_title, "Windows 10 Version 21H1");
        assert_eq!(c.architecture, Some(Architecture::X64));
    }

    #[test]
    fn test_architecture_x64_from_title_and_filename() {
        assert_eq!(
            architecture("Update for x64-based Systems", "foo-x64_abc.msu"),
            Some(Architecture::X64)
        );
        assert_eq!(architecture("64-bit edition", "setup.exe"), Some(Architecture::X64));
    }

    #[test]
    fn test_architecture_order_prefers_x64() {
        // "x86" and "x64" both present: x64 rule comes first
        assert_eq!(
            architecture("Update for x86 and x64", "pkg.msu"),
            Some(Architecture::X64)
        );
    }

    #[test]
    fn test_architecture_arm64_and_x86() {
        assert_eq!(
            architecture("Update for ARM64-based Systems", "windows10.0-kb1-arm64_ab.msu"),
            Some(Architecture::Arm64)
        );
        assert_eq!(
            architecture("Security Update (32-bit)", "pkg.exe"),
            Some(Architecture::X86)
        );
        assert_eq!(architecture("", "windows6.1-kb1-x86_ab.msu"), Some(Architecture::X86));
    }

    #[test]
    fn test_architecture_unset_without_markers() {
        assert_eq!(architecture("Servicing Stack Update", "update.msu"), None);
    }

    #[test]
    fn test_versioned_os_rules_beat_family_rule() {
        assert_eq!(product_for("Windows 10 Version 1809"), Some("Windows 10 Version 1809"));
        assert_eq!(product_for("Windows 10 Version 1909"), Some("Windows 10 Version 1909"));
        assert_eq!(product_for("Windows 10 Version 2004"), Some("Windows 10 Version 2004"));
        assert_eq!(product_for("Windows 10 Version 20H2"), Some("Windows 10 Version 20H2"));
        assert_eq!(product_for("Windows 10 Version 1507"), Some("Windows 10 Version 1507"));
        assert_eq!(product_for("Windows 10 Version 1607"), Some("Windows 10 Version 1607"));
        assert_eq!(product_for("Windows 10 Enterprise"), Some("Windows 10"));
    }

    #[test]
    fn test_windows_server_rules() {
        assert_eq!(
            product_for("Windows Server 2012 R2 Monthly Rollup"),
            Some("Windows Server 2012 R2")
        );
        assert_eq!(product_for("Windows Server 2012 Monthly Rollup"), Some("Windows Server 2012"));
        assert_eq!(
            product_for("Windows Server 2008 R2 for Itanium"),
            Some("Windows Server 2008 R2")
        );
        assert_eq!(product_for("Windows Server 2019"), Some("Windows Server 2019"));
        assert_eq!(
            product_for("Windows Server, version 20H2"),
            Some("Windows Server, version 20H2")
        );
        assert_eq!(product_for("Windows Server Update Services"), Some("Windows Server"));
    }

    #[test]
    fn test_os_table_checked_before_applications() {
        assert_eq!(
            product_for(".NET Framework 4.8 for Windows 10 Version 1909"),
            Some("Windows 10 Version 1909")
        );
    }

    #[test]
    fn test_application_rules() {
        assert_eq!(product_for(".NET Core 3.1.17"), Some(".NET Core"));
        assert_eq!(product_for(".NET Framework 4.8"), Some(".NET Framework"));
        assert_eq!(product_for("Microsoft Excel 2016"), Some("Excel"));
        assert_eq!(product_for("Microsoft Office 2016 Word"), Some("Word"));
        assert_eq!(product_for("Microsoft Office 2019"), Some("Office"));
        assert_eq!(product_for("SharePoint Server 2019"), Some("SharePoint"));
        assert_eq!(product_for("Microsoft Edge (Chromium)"), Some("Edge"));
        assert_eq!(
            product_for("Malicious Software Removal Tool v5.91"),
            Some("Malicious Software Removal Tool")
        );
        assert_eq!(product_for("Exchange Server 2016 CU21"), Some("Exchange"));
        assert_eq!(product_for("Azure Stack Hub"), Some("Azure Stack"));
        assert_eq!(product_for("Visual Studio 2019"), None);
    }

    #[test]
    fn test_kb_number() {
        assert_eq!(kb_number("Update (KB5004237)").as_deref(), Some("5004237"));
        assert_eq!(kb_number("Update (KB4.18.2107)").as_deref(), Some("4.18.2107"));
        assert_eq!(kb_number("Update (KB50042a7)"), None);
        assert_eq!(kb_number("Update KB5004237"), None);
        assert_eq!(kb_number("Update (KB5004237"), None);
        assert_eq!(kb_number("No knowledge base article"), None);
    }

    #[test]
    fn test_guid_label() {
        assert_eq!(
            guid_label("windows10.0-kb4534273-x64_74bf76bc5a941bbbd0052caf5c3f956867e1de38.msu").as_deref(),
            Some("74bf76bc5a941bbbd0052caf5c3f956867e1de38")
        );
        assert_eq!(guid_label("a_b_c.d.e").as_deref(), Some("c"));
        assert_eq!(guid_label("setup.exe"), None);
        assert_eq!(guid_label("trailing_"), None);
    }

    #[test]
    fn test_split_leading_date() {
        assert_eq!(
            split_leading_date("July 2021 Windows 10"),
            (Some("July"), "Windows 10")
        );
        assert_eq!(split_leading_date("march Office"), (Some("march"), "Office"));
        assert_eq!(
            split_leading_date("2021-07 Cumulative Update"),
            (Some("2021-07"), "Cumulative Update")
        );
        assert_eq!(split_leading_date("Windows 7"), (None, "Windows 7"));
        assert_eq!(split_leading_date("May 2020"), (Some("May"), ""));
    }

    #[test]
    fn test_leading_year_does_not_pick_server_release() {
        // "2016" here is the bulletin year, not the server release
        let c = classify("June 2016 Windows Server 2012 R2 (KB3161608)", "kb3161608-x64_1a.msu");
        assert_eq!(c.product.as_deref(), Some("Windows Server 2012 R2"));
        assert_eq!(c.clean_title, "Windows Server 2012 R2");
    }

    #[test]
    fn test_title_without_kb_keeps_suffix() {
        let c = classify("August 2021 Office 2016", "office.cab");
        assert_eq!(c.kb, None);
        assert_eq!(c.guid, None);
        assert_eq!(c.clean_title, "Office 2016");
        assert_eq!(c.product.as_deref(), Some("Office"));
    }
}
