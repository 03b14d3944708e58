//! Interface de linha de comando do doc-analyst baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, questions,
//! provision) e flags globais que sobrescrevem a configuração carregada.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AnalystConfig;

/// doc-analyst: responde um questionário por seção sobre documentos de texto.
#[derive(Debug, Parser)]
#[command(name = "doc-analyst", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Arquivo de configuração (padrão: ./doc-analyst.toml, se existir).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Deployment do modelo usado pelo assistente.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Máximo de submissões de run por seção.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    #[arg(long, global = true)]
    pub input_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Catálogo de perguntas em TOML no lugar do embutido.
    #[arg(long, global = true)]
    pub questions: Option<PathBuf>,

    /// Grava também uma planilha .xlsx por documento.
    #[arg(long, global = true, default_value_t = false)]
    pub xlsx: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Processa todos os documentos .txt do diretório de entrada.
    Run {
        /// Documentos específicos a processar, em vez do diretório de entrada.
        documents: Vec<PathBuf>,
    },

    /// Lista o catálogo de perguntas efetivo.
    Questions {
        /// Imprime o catálogo como JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Cria ou normaliza o assistente remoto e imprime seu id.
    Provision,
}

impl Cli {
    /// Aplica as flags globais sobre a configuração; flags ausentes não alteram nada.
    pub fn apply_overrides(&self, config: &mut AnalystConfig) {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(max) = self.max_retries {
            config.max_retries_rate = max;
        }
        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(path) = &self.questions {
            config.questions_file = Some(path.clone());
        }
        if self.xlsx {
            config.export_spreadsheet = true;
        }
    }
}
