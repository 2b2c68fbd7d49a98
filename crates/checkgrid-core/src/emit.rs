use crate::config::Config;
use crate::model::format_date;
use crate::render::RenderedRow;

/// Emits the checklist as a static HTML table.
///
/// Question cells carry the already sanitized question markup; every other
/// string is escaped.
pub fn emit_table_html(config: &Config, table: &[RenderedRow]) -> String {
    // Deterministic formatting: 2-space indentation and LF newlines.
    let mut writer = HtmlWriter::new();
    writer.line("<div class=\"checkgrid\">");
    writer.indent += 1;
    writer.line(&format!(
        "<h2 class=\"checkgrid-title\">{}</h2>",
        escape_html(&config.table_title)
    ));
    writer.line("<table>");
    writer.indent += 1;
    writer.line("<thead>");
    writer.indent += 1;
    writer.line(&format!(
        "<tr><th>{}</th><th>{}</th><th>{}</th></tr>",
        escape_html(&config.col_question_header),
        escape_html(&config.col_choice_header),
        escape_html(&config.col_date_header)
    ));
    writer.indent -= 1;
    writer.line("</thead>");
    writer.line("<tbody>");
    writer.indent += 1;
    for row in table {
        emit_row(&mut writer, row);
    }
    writer.indent -= 1;
    writer.line("</tbody>");
    writer.indent -= 1;
    writer.line("</table>");
    writer.indent -= 1;
    writer.line("</div>");
    writer.finish()
}

fn emit_row(writer: &mut HtmlWriter, row: &RenderedRow) {
    writer.line("<tr>");
    writer.indent += 1;
    writer.line(&format!(
        "<td><p class=\"q\" aria-readonly=\"true\">{}</p></td>",
        row.question_html
    ));

    writer.line("<td class=\"choice-cell\">");
    writer.indent += 1;
    writer.line(&format!(
        "<div class=\"radio-group\" role=\"radiogroup\" aria-label=\"{}\">",
        escape_attr(&row.aria_label)
    ));
    writer.indent += 1;
    for (idx, option) in row.options.iter().enumerate() {
        let id = format!("{}-{}", row.group_name, idx);
        let checked = if row.answer.selected.as_deref() == Some(option.as_str()) {
            " checked"
        } else {
            ""
        };
        writer.line(&format!(
            "<div class=\"radio-wrap\"><input type=\"radio\" name=\"{}\" id=\"{}\" value=\"{}\"{}><label for=\"{}\">{}</label></div>",
            escape_attr(&row.group_name),
            escape_attr(&id),
            escape_attr(option),
            checked,
            escape_attr(&id),
            escape_html(option)
        ));
    }
    writer.indent -= 1;
    writer.line("</div>");
    writer.indent -= 1;
    writer.line("</td>");

    let mut date_attrs = String::new();
    if let Some(max) = row.date_max {
        date_attrs.push_str(&format!(" max=\"{}\"", format_date(max)));
    }
    if let Some(value) = row.answer.answered_on {
        date_attrs.push_str(&format!(" value=\"{}\"", format_date(value)));
    }
    writer.line(&format!(
        "<td><input type=\"date\" class=\"date\" placeholder=\"YYYY-MM-DD\"{}></td>",
        date_attrs
    ));
    writer.indent -= 1;
    writer.line("</tr>");
}

struct HtmlWriter {
    out: String,
    indent: usize,
}

impl HtmlWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    fn line(&mut self, line: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn finish(mut self) -> String {
        if self.out.ends_with('\n') {
            self.out.pop();
        }
        self.out
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::new();
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(text: &str) -> String {
    let mut out = String::new();
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::Row;
    use crate::render::project;

    #[test]
    fn table_marks_selection_and_date_limits() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap_or_default();
        let config = Config::default();
        let rows = vec![Row::new("<b>Q&amp;A</b>").with_options(vec!["A \"x\"".to_string()])];
        let mut table = project(&rows, &config.choices, &config, today);
        table[0].select("A \"x\"", today, false);

        let html = emit_table_html(&config, &table);
        assert!(html.contains("<h2 class=\"checkgrid-title\">Learning &amp; Development Evaluation</h2>"));
        assert!(html.contains("<p class=\"q\" aria-readonly=\"true\"><b>Q&amp;A</b></p>"));
        assert!(html.contains("value=\"A &quot;x&quot;\" checked>"));
        assert!(html.contains("max=\"2024-05-06\" value=\"2024-05-06\""));
        assert!(html.contains("aria-label=\"Response for &quot;Q&amp;A&quot;\""));
    }
}
