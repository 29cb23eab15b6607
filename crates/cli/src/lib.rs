use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use doc_model::{parse_hex_color, ElementKind, ElementType, ScreenPoint};
use pdf_engine::{
    ImageFormat, LopdfDocument, PageDocument, PageRasterizer, PageSize, PreviewRasterizer,
    ThumbnailSize,
};
use serde::Serialize;
use stampwork_core::{
    encode_data_url, CancellationToken, EditorSession, ExportFlattener, FlattenOptions,
};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::{load_project, project_path_for, save_project, EditorSettings, Project, Storage};

#[derive(Debug, Parser)]
#[command(name = "stampwork")]
#[command(about = "Place overlays on PDF pages and flatten them into the document")]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Settings directory. Defaults to the platform data directory.
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Create an empty overlay project for a PDF.
    Init {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Defaults to FILE with a `.stampwork.json` extension.
        #[arg(long)]
        project: Option<PathBuf>,
        /// Screen pixels per PDF point. Defaults to the configured scale.
        #[arg(long)]
        scale: Option<f64>,
    },
    /// Place an element on a page of a project.
    Add {
        #[arg(long)]
        project: PathBuf,
        #[arg(long = "type", value_name = "TYPE")]
        element_type: ElementType,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 0.0)]
        x: f64,
        #[arg(long, default_value_t = 0.0)]
        y: f64,
        /// Text, field value, heading, video URL, or table rows as `a,b;c,d`.
        #[arg(long)]
        content: Option<String>,
        /// PNG or JPEG for image-like elements.
        #[arg(long, value_name = "FILE")]
        image: Option<PathBuf>,
        #[arg(long)]
        checked: bool,
    },
    /// Insert, delete or move a page in both the PDF and its project.
    #[command(group(
        ArgGroup::new("operation").required(true).args(["insert_after", "delete", "move_page"])
    ))]
    Edit {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Updated in place.
        #[arg(long)]
        project: Option<PathBuf>,
        /// Insert a blank page after PAGE (0 inserts at the front).
        #[arg(long, value_name = "PAGE")]
        insert_after: Option<u32>,
        #[arg(long, value_name = "PAGE")]
        delete: Option<u32>,
        /// Move page FROM so it becomes page TO.
        #[arg(long = "move", num_args = 2, value_names = ["FROM", "TO"])]
        move_page: Option<Vec<u32>>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Burn the project's elements into a copy of the PDF.
    Flatten {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        project: Option<PathBuf>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Render a preview PNG for a page.
    RenderThumb {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Render at this scale instead of fitting WIDTH x HEIGHT.
        #[arg(long)]
        scale: Option<f32>,
        #[arg(long, default_value_t = 320)]
        width: u32,
        #[arg(long, default_value_t = 320)]
        height: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct FlattenOutput {
    output: String,
    drawn: usize,
    skipped: usize,
    placeholders: usize,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);
    let settings = load_settings(cli.data_dir.as_deref());

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Init {
            file,
            project,
            scale,
        } => {
            let project = project.unwrap_or_else(|| project_path_for(&file));
            run_init(&file, &project, scale.unwrap_or(settings.preview_scale))
        }
        Commands::Add {
            project,
            element_type,
            page,
            x,
            y,
            content,
            image,
            checked,
        } => {
            let kind = element_kind(element_type, content, image.as_deref(), checked)?;
            run_add(&project, kind, page, ScreenPoint::new(x, y))
        }
        Commands::Edit {
            file,
            project,
            insert_after,
            delete,
            move_page,
            output,
        } => {
            let project = project.unwrap_or_else(|| project_path_for(&file));
            let edit = match (insert_after, delete, move_page.as_deref()) {
                (Some(after), _, _) => PageEdit::InsertAfter(after),
                (_, Some(page), _) => PageEdit::Delete(page),
                (_, _, Some(&[from, to])) => PageEdit::Move { from, to },
                _ => bail!("one of --insert-after, --delete or --move FROM TO is required"),
            };
            run_edit(&file, &project, edit, &output, &settings)
        }
        Commands::Flatten {
            file,
            project,
            output,
        } => {
            let project = project.unwrap_or_else(|| project_path_for(&file));
            run_flatten(&file, &project, &output, &settings)
        }
        Commands::RenderThumb {
            file,
            page,
            scale,
            width,
            height,
            output,
        } => {
            let target = ThumbnailSize {
                width_px: width,
                height_px: height,
            };
            run_render_thumb(&file, page, scale, target, output.as_deref())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn load_settings(data_dir: Option<&Path>) -> EditorSettings {
    let storage = match data_dir {
        Some(dir) => Ok(Storage::with_root(dir)),
        None => Storage::from_default_project(),
    };

    match storage.and_then(|storage| storage.load_settings()) {
        Ok(settings) => settings,
        Err(error) => {
            log::warn!("using default settings: {error}");
            EditorSettings::default()
        }
    }
}

fn run_info(file: &Path) -> Result<()> {
    let document = open_pdf(file)?;

    let pages = (0..document.page_count())
        .map(|index| {
            document
                .page_size(index)
                .map(|size| PageSizeOutput {
                    width: size.width_pt,
                    height: size.height_pt,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let payload =
        InfoOutput {
            path: file.display().to_string(),
            page_count: document.page_count(),
            pages,
        };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");
    Ok(())
}

fn run_init(file: &Path, project_path: &Path, scale: f64) -> Result<()> {
    let document = open_pdf(file)?;
    let session = EditorSession::from_document(document, scale)?;

    save_project(project_path, &Project::new(session.current().clone(), scale))
        .with_context(|| format!("failed to write project {}", project_path.display()))?;
    println!("{}", project_path.display());
    Ok(())
}

fn run_add(project_path: &Path, kind: ElementKind, page: u32, anchor: ScreenPoint) -> Result<()> {
    let mut project = read_project(project_path)?;
    let (snapshot, id) = project
        .snapshot
        .add_element_kind(kind, page, anchor)
        .context("failed to place element")?;

    project.snapshot = snapshot;
    save_project(project_path, &project)?;
    println!("{id}");
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum PageEdit {
    InsertAfter(u32),
    Delete(u32),
    /// 1-based pages.
    Move { from: u32, to: u32 },
}

fn run_edit(
    file: &Path,
    project_path: &Path,
    edit: PageEdit,
    output: &Path,
    settings: &EditorSettings,
) -> Result<()> {
    let mut session = open_session(file, project_path)?;

    let result = match edit {
        PageEdit::InsertAfter(after) => {
            let size = settings.default_blank_page;
            session.insert_blank_page(after, PageSize::new(size.width, size.height))
        }
        PageEdit::Delete(page) => session.delete_page(page),
        PageEdit::Move { from, to } => {
            if from == 0 || to == 0 {
                bail!("--move takes 1-based page numbers");
            }
            session.reorder_page(from - 1, to - 1)
        }
    };
    result.context("page edit rejected")?;

    let bytes = session.document().clone().save().context("failed to serialize PDF")?;
    write_output(output, &bytes)?;

    let project = Project::new(session.current().clone(), session.preview_scale());
    save_project(project_path, &project)?;
    println!("{}", output.display());
    Ok(())
}

fn run_flatten(
    file: &Path,
    project_path: &Path,
    output: &Path,
    settings: &EditorSettings,
) -> Result<()> {
    let options = FlattenOptions {
        placeholder_fill: parse_hex_color(&settings.placeholder_fill).into(),
        placeholder_border: parse_hex_color(&settings.placeholder_border).into(),
        log_skipped_elements: settings.log_skipped_elements,
    };
    let session = open_session(file, project_path)?.with_flattener(ExportFlattener::new(options));

    let (bytes, report) = session.export_with_report().context("failed to flatten PDF")?;
    write_output(output, &bytes)?;

    let payload = FlattenOutput {
        output: output.display().to_string(),
        drawn: report.drawn,
        skipped: report.skipped,
        placeholders: report.placeholders,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_render_thumb(
    file: &Path,
    page: u32,
    scale: Option<f32>,
    target: ThumbnailSize,
    output: Option<&Path>,
) -> Result<()> {
    if page == 0 {
        bail!("--page is 1-based and must be >= 1");
    }

    let document = open_pdf(file)?;
    let rasterizer = PreviewRasterizer::default();
    let token = CancellationToken::new();
    let image = match scale {
        Some(scale) => rasterizer.render_page(&document, page, scale, &token),
        None => rasterizer.render_thumbnail(&document, page, target, &token),
    }
    .context("failed to render thumbnail")?;

    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| default_thumbnail_output(file, page));

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}

fn element_kind(
    element_type: ElementType,
    content: Option<String>,
    image: Option<&Path>,
    checked: bool,
) -> Result<ElementKind> {
    let image_data = image.map(read_image_data).transpose()?.unwrap_or_default();
    let content = content.unwrap_or_default();

    let mut kind = element_type.default_kind(0);
    match &mut kind {
        ElementKind::Text(text) => text.content = content,
        ElementKind::TextField(field) => field.value = content,
        ElementKind::Date(field) => field.value = content,
        ElementKind::Heading(heading) => heading.text = content,
        ElementKind::Video(video) => video.url = content,
        ElementKind::Table(table) if !content.is_empty() => table.rows = parse_rows(&content),
        ElementKind::Table(_) => {}
        ElementKind::Checkbox(field) => field.checked = checked,
        ElementKind::Image(props) | ElementKind::Signature(props) => props.image_data = image_data,
        ElementKind::Initials(field) => field.image_data = image_data,
        ElementKind::ImageBlock(block) => block.image_data = image_data,
    }
    Ok(kind)
}

/// `a,b;c,d` -> two rows of two cells.
fn parse_rows(content: &str) -> Vec<Vec<String>> {
    content
        .split(';')
        .map(|row| row.split(',').map(|cell| cell.trim().to_owned()).collect())
        .collect()
}

fn read_image_data(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read image {}", path.display()))?;
    let format = match image::guess_format(&bytes) {
        Ok(image::ImageFormat::Png) => ImageFormat::Png,
        Ok(image::ImageFormat::Jpeg) => ImageFormat::Jpeg,
        _ => bail!("{} is not a PNG or JPEG image", path.display()),
    };
    Ok(encode_data_url(format, &bytes))
}

fn open_pdf(file: &Path) -> Result<LopdfDocument> {
    ensure_pdf_exists(file)?;
    LopdfDocument::open(file).context("failed to open PDF")
}

fn open_session(file: &Path, project_path: &Path) -> Result<EditorSession<LopdfDocument>> {
    let document = open_pdf(file)?;
    let project = read_project(project_path)?;
    EditorSession::with_snapshot(document, project.snapshot, project.preview_scale)
        .context("project does not match the PDF")
}

fn read_project(path: &Path) -> Result<Project> {
    load_project(path).with_context(|| format!("failed to read project {}", path.display()))
}

fn write_output(output: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, bytes).with_context(|| format!("failed to write {}", output.display()))
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_thumbnail_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("thumbnail");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rows_parse_from_content() {
        assert_eq!(
            parse_rows("a, b;c"),
            vec![vec!["a".to_owned(), "b".to_owned()], vec!["c".to_owned()]]
        );
    }

    #[test]
    fn content_lands_in_the_kind_specific_field() {
        let kind = element_kind(ElementType::Heading, Some("Terms".to_owned()), None, false)
            .expect("kind");
        assert!(matches!(kind, ElementKind::Heading(ref heading) if heading.text == "Terms"));

        let kind = element_kind(ElementType::Checkbox, None, None, true).expect("kind");
        assert!(matches!(kind, ElementKind::Checkbox(ref field) if field.checked));
    }

    #[test]
    fn edit_requires_exactly_one_operation() {
        let parsed = Cli::try_parse_from(["stampwork", "edit", "a.pdf", "--output", "b.pdf"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from([
            "stampwork",
            "edit",
            "a.pdf",
            "--delete",
            "1",
            "--insert-after",
            "1",
            "--output",
            "b.pdf",
        ]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from([
            "stampwork",
            "edit",
            "a.pdf",
            "--move",
            "1",
            "3",
            "--output",
            "b.pdf",
        ]);
        assert!(parsed.is_ok());
    }
}
