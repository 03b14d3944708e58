//! Interface de terminal do doc-analyst: barra de progresso e resumo colorido.
//!
//! Usa `indicatif` para a barra do lote e `console` para as cores. Os logs
//! detalhados seguem pelo `tracing` em stderr.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::output::{BatchReport, DocumentReport, DocumentStatus};

/// Progresso visual de um lote de documentos.
pub struct BatchProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl BatchProgress {
    pub fn start(total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{pos}/{len}] {wide_bar:.cyan/blue} {msg}")
                .expect("invalid template")
                .progress_chars("=> "),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Registra o fim de um documento e avança a barra.
    pub fn document_done(&self, doc: &DocumentReport) {
        let line = match doc.status {
            DocumentStatus::Completed if doc.sentinel_answers > 0 => format!(
                "  {} {} ({} answers, {} without information)",
                self.yellow.apply_to("✓"),
                doc.document,
                doc.records,
                doc.sentinel_answers
            ),
            DocumentStatus::Completed => format!(
                "  {} {} ({} answers)",
                self.green.apply_to("✓"),
                doc.document,
                doc.records
            ),
            DocumentStatus::Skipped => format!(
                "  {} {} skipped: {}",
                self.red.apply_to("✗"),
                doc.document,
                doc.reason.as_deref().unwrap_or("unknown error")
            ),
        };
        self.pb.println(line);
        self.pb.inc(1);
    }

    /// Finaliza a barra e imprime o resumo do lote.
    pub fn finish(&self, report: &BatchReport) {
        self.pb.finish_and_clear();
        let skipped = report.skipped();
        let style = if skipped == 0 { &self.green } else { &self.yellow };
        println!();
        println!("{}", style.apply_to("─── Batch Summary ───"));
        println!("  batch:     {}", report.batch_id);
        println!("  completed: {}", report.completed());
        println!("  skipped:   {skipped}");
    }
}
