use std::io::{self, IsTerminal, Stdout, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::form::FormMode;
use crate::view::{
    AuthForm, CardAction, FormView, NavView, Renderer, SectionView, TaskCard, TaskListView,
    ViewModel,
};

/// Reads the `color` setting.
pub fn color_enabled(cfg: &Config) -> anyhow::Result<bool> {
    let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
    match color_cfg.to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Ok(true),
        "off" | "no" | "false" | "0" => Ok(false),
        other => Err(anyhow!("invalid color setting: {other}")),
    }
}

/// Prints view descriptions as plain text.
///
/// `render` only remembers the latest view; it is written out on `flush`,
/// so a command that re-renders several times prints once.
#[derive(Debug)]
pub struct TerminalRenderer<W: Write> {
    out: W,
    color: bool,
    pending: Option<ViewModel>,
}

impl TerminalRenderer<Stdout> {
    pub fn stdout(color: bool) -> Self {
        let color = color && io::stdout().is_terminal();
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            pending: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    #[tracing::instrument(skip_all)]
    fn write_view(&mut self, view: &ViewModel) -> anyhow::Result<()> {
        self.write_nav(&view.nav)?;
        match &view.section {
            SectionView::Auth { form } => self.write_auth(*form)?,
            SectionView::Tasks { form, list } => {
                self.write_form(form)?;
                self.write_list(list)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    fn write_nav(&mut self, nav: &NavView) -> anyhow::Result<()> {
        if let Some(user) = &nav.current_user {
            let user = self.paint(user, "1");
            writeln!(self.out, "Logged in as {user}")?;
        }
        Ok(())
    }

    fn write_auth(&mut self, form: AuthForm) -> anyhow::Result<()> {
        writeln!(self.out, "Not logged in.")?;
        match form {
            AuthForm::Login => writeln!(
                self.out,
                "Log in with: taskmate login <username> [password]"
            )?,
            AuthForm::Register => writeln!(
                self.out,
                "Register with: taskmate register <username> <password> <email>"
            )?,
        }
        Ok(())
    }

    fn write_form(&mut self, form: &FormView) -> anyhow::Result<()> {
        let FormMode::Edit(id) = form.mode else {
            return Ok(());
        };
        let heading = self.paint(&format!("Editing task {id}"), "33");
        writeln!(self.out, "{heading}")?;
        writeln!(self.out, "  title        {}", form.fields.title)?;
        writeln!(self.out, "  description  {}", form.fields.description)?;
        writeln!(self.out, "  due          {}", form.fields.due_date)?;
        writeln!(self.out, "  priority     {}", form.fields.priority)?;
        writeln!(
            self.out,
            "  ('save' to {}, 'cancel' to discard)",
            form.submit_label.to_ascii_lowercase()
        )?;
        writeln!(self.out)?;
        Ok(())
    }

    fn write_list(&mut self, list: &TaskListView) -> anyhow::Result<()> {
        let cards = match list {
            TaskListView::Placeholder(text) => {
                writeln!(self.out, "{text}")?;
                return Ok(());
            }
            TaskListView::Cards(cards) => cards,
        };

        let headers = ["ID", "Title", "Priority", "Due", "Status", "Description", "Actions"]
            .into_iter()
            .map(str::to_string)
            .collect();
        let rows = cards.iter().map(|card| self.card_row(card)).collect();
        write_table(&mut self.out, headers, rows)
    }

    fn card_row(&self, card: &TaskCard) -> Vec<String> {
        let priority = match card.priority.as_str() {
            "HIGH" => self.paint(&card.priority, "31"),
            "MEDIUM" => self.paint(&card.priority, "33"),
            _ => self.paint(&card.priority, "32"),
        };
        let status = if card.completed {
            self.paint(&card.status, "32")
        } else {
            card.status.clone()
        };
        let actions = card
            .actions
            .iter()
            .map(|action| match action {
                CardAction::Complete => "done",
                CardAction::Edit => "edit",
                CardAction::Delete => "delete",
            })
            .collect::<Vec<_>>()
            .join(" ");

        vec![
            self.paint(&card.id.to_string(), "33"),
            card.title.clone(),
            priority,
            card.due.clone(),
            status,
            card.description.clone(),
            actions,
        ]
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn render(&mut self, view: &ViewModel) -> anyhow::Result<()> {
        self.pending = Some(view.clone());
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        match self.pending.take() {
            Some(view) => self.write_view(&view),
            None => Ok(()),
        }
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
