//! # Easy Read CLI
//!
//! Usage:
//!   easyread build blocks.json --template 3 --backend docx
//!   easyread plan blocks.json
//!   easyread edit blocks.json --set 2:box1="New text" --write-blocks blocks.json
//!   easyread example > blocks.json

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use easyread::output::write_atomic;
use easyread::{
    Backend, BuildReport, Document, EasyReadError, EditRequest, LayoutTemplate, Result, Session,
    Settings,
};

#[derive(Parser)]
#[command(
    name = "easyread",
    about = "Lay out Easy Read documents as paginated PDF or DOCX",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lay out a document and write the artifact
    Build {
        #[command(flatten)]
        common: CommonArgs,

        /// Also write the page → slot → text map as JSON
        #[arg(long)]
        page_map: Option<PathBuf>,
    },

    /// Print the layout (pages, slots, offsets, warnings) without rendering
    Plan {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Build, apply text edits to the built layout, then rebuild
    Edit {
        #[command(flatten)]
        common: CommonArgs,

        /// Edit in PAGE:SLOT=TEXT form, e.g. 2:box1="New text"
        #[arg(long = "set", value_name = "PAGE:SLOT=TEXT", required = true)]
        edits: Vec<String>,

        /// Write the edited blocks back out as a document
        #[arg(long)]
        write_blocks: Option<PathBuf>,
    },

    /// Print an example input document
    Example,
}

#[derive(Args)]
struct CommonArgs {
    /// Input document (JSON)
    input: PathBuf,

    /// Boxes per page (3 or 4); overrides the document's template
    #[arg(short, long)]
    template: Option<LayoutTemplate>,

    /// Output backend: pdf or docx
    #[arg(short, long, default_value = "pdf")]
    backend: Backend,

    /// Settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the artifact; overrides the settings file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Directory for page thumbnails; overrides the settings file
    #[arg(long)]
    preview_dir: Option<PathBuf>,

    /// Fail on an empty document instead of writing a blank page
    #[arg(long)]
    strict: bool,
}

impl CommonArgs {
    fn session(&self) -> Result<Session> {
        let json = std::fs::read_to_string(&self.input)
            .map_err(|e| EasyReadError::Io {
                path: self.input.clone(),
                source: e,
            })?;
        let document = Document::from_json(&json)?;

        let mut settings = match &self.config {
            Some(path) => Settings::from_json_file(path)?,
            None => Settings::default(),
        };
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(dir) = &self.preview_dir {
            settings.preview_dir = Some(dir.clone());
        }
        if settings.asset_dir.is_none() {
            settings.asset_dir = self.input.parent().map(Path::to_path_buf);
        }

        let template = self.template.or(document.template).unwrap_or_default();
        Ok(Session::new(document.blocks, template, self.backend, settings)?.strict_empty(self.strict))
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build { common, page_map } => {
            let mut session = common.session()?;
            let report = session.build()?;
            print_summary(&report);
            if let (Some(path), Some(map)) = (page_map, session.page_text_boxes()) {
                write_atomic(&path, serde_json::to_string_pretty(map)?.as_bytes())?;
                eprintln!("✓ Page map written to {}", path.display());
            }
        }
        Commands::Plan { common } => {
            let layout = common.session()?.plan()?;
            println!("{}", layout.to_json()?);
        }
        Commands::Edit {
            common,
            edits,
            write_blocks,
        } => {
            let mut session = common.session()?;
            let version = session.build()?.version;
            for assignment in &edits {
                let edit = EditRequest::parse_assignment(version, assignment)?;
                let index = session.apply_edit(&edit)?;
                eprintln!("✓ Block {} ({} on page {}) updated", index, edit.slot, edit.page);
            }
            let report = session.build()?;
            print_summary(&report);
            if let Some(path) = write_blocks {
                let document = Document {
                    blocks: session.blocks().to_vec(),
                    template: Some(session.template()),
                };
                write_atomic(&path, document.to_json()?.as_bytes())?;
                eprintln!("✓ Edited blocks written to {}", path.display());
            }
        }
        Commands::Example => print!("{}", example_document_json()),
    }
    Ok(())
}

fn print_summary(report: &BuildReport) {
    eprintln!(
        "✓ Layout v{}: {} page(s) {:?} written to {}",
        report.version,
        report.total_pages,
        report.page_counts,
        report.artifact.display()
    );
    if !report.previews.is_empty() {
        eprintln!("✓ {} preview(s) written", report.previews.len());
    }
    for warning in &report.warnings {
        eprintln!("! {:?}", warning);
    }
}

fn example_document_json() -> &'static str {
    r##"{
  "template": 4,
  "blocks": [
    {
      "imageReference": "images/welcome.png",
      "text": "Welcome to your new home.\nThis guide tells you about your rights."
    },
    {
      "imageReference": "images/safe.png",
      "text": "You have the right to feel safe.\nTell a support worker if you feel unsafe."
    },
    {
      "imageReference": "images/choice.png",
      "text": "You can choose what you do each day."
    },
    {
      "imageReference": "images/privacy.png",
      "text": "Your room is private. Staff will knock before they come in."
    },
    {
      "imageReference": "images/help.png",
      "text": "If you need help, you can call us at any time."
    }
  ]
}
"##
}
