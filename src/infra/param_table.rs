// ============================================================
// Layer 6 — Parameter Table
// ============================================================
// Renders the per-component parameter counts that are logged
// before training starts:
//
//   +--------------------+------------+
//   | Modules            | Parameters |
//   +--------------------+------------+
//   | embedding          |     12,288 |
//   | decoder.block_0    |      4,352 |
//   +--------------------+------------+
//   | Total              |     16,640 |
//   +--------------------+------------+

const NAME_HEADER: &str = "Modules";
const COUNT_HEADER: &str = "Parameters";

pub fn render(rows: &[(String, usize)]) -> String {
    let total: usize = rows.iter().map(|(_, n)| n).sum();
    let total_str = thousands(total);

    let name_width = rows
        .iter()
        .map(|(name, _)| name.chars().count())
        .chain([NAME_HEADER.len(), "Total".len()])
        .max()
        .unwrap_or(0);
    let count_width = rows
        .iter()
        .map(|(_, n)| thousands(*n).len())
        .chain([COUNT_HEADER.len(), total_str.len()])
        .max()
        .unwrap_or(0);

    let rule = format!("+-{}-+-{}-+", "-".repeat(name_width), "-".repeat(count_width));
    let line = |name: &str, count: &str| {
        format!("| {name:<name_width$} | {count:>count_width$} |")
    };

    let mut out = vec![rule.clone(), line(NAME_HEADER, COUNT_HEADER), rule.clone()];
    out.extend(rows.iter().map(|(name, n)| line(name, &thousands(*n))));
    out.push(rule.clone());
    out.push(line("Total", &total_str));
    out.push(rule);
    out.join("\n")
}

/// `1234567` → `"1,234,567"`
pub fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_render_aligns_columns_and_totals() {
        let rows = vec![
            ("embedding".to_string(), 12_288),
            ("decoder.block_0".to_string(), 4_352),
        ];
        let table = render(&rows);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 8);
        assert!(lines.iter().all(|l| l.len() == lines[0].len()));
        assert!(lines[3].contains("12,288"));
        assert!(lines[6].starts_with("| Total"));
        assert!(lines[6].trim_end().ends_with("16,640 |"));
    }

    #[test]
    fn test_render_empty() {
        let table = render(&[]);
        assert!(table.contains("| Total"));
        assert!(table.contains(" 0 |"));
    }
}
