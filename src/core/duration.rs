/// Renders a month count as "N years and M months", dropping the zero part.
pub fn format_duration(months: u32) -> String {
    let years = months / 12;
    let remaining = months % 12;
    if years > 0 && remaining > 0 {
        format!(
            "{} and {}",
            counted(years, "year"),
            counted(remaining, "month")
        )
    } else if years > 0 {
        counted(years, "year")
    } else {
        counted(remaining, "month")
    }
}

fn counted(value: u32, noun: &str) -> String {
    if value == 1 {
        format!("{value} {noun}")
    } else {
        format!("{value} {noun}s")
    }
}
