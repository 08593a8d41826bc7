use std::fs;
use std::path::{Path, PathBuf};

use argh::FromArgs;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use chord_progress_share::catalog::store::client_ip;
use chord_progress_share::notation::SLOTS_PER_MEASURE;
use chord_progress_share::{
    Catalog, ChordSymbol, Config, ProgressionDraft, Result, chord_options, format_measures,
    logging, normalize_chord, normalize_search_query, search_in_normalized,
};

/// Share and search chord progressions written in scale degrees
#[derive(FromArgs)]
struct Args {
    /// path to a YAML config file
    #[argh(option)]
    config: Option<String>,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Normalize(NormalizeArgs),
    Query(QueryArgs),
    Match(MatchArgs),
    Options(OptionsArgs),
    List(ListArgs),
    Show(ShowArgs),
    Submit(SubmitArgs),
    Edit(EditArgs),
    Feedback(FeedbackArgs),
}

/// Normalize chord tokens and show their parts
#[derive(FromArgs)]
#[argh(subcommand, name = "normalize")]
struct NormalizeArgs {
    /// chord tokens, e.g. Ⅳmaj7 ♭Ⅶ
    #[argh(positional)]
    chords: Vec<String>,
}

/// Normalize a chord search query
#[derive(FromArgs)]
#[argh(subcommand, name = "query")]
struct QueryArgs {
    /// query text, e.g. "Ⅳ-Ⅴ"
    #[argh(positional)]
    query: String,
}

/// Check whether a query matches a normalized chord string
#[derive(FromArgs)]
#[argh(subcommand, name = "match")]
struct MatchArgs {
    /// normalized chords, e.g. "IV|V|IIIm|VIm"
    #[argh(positional)]
    normalized: String,

    /// query text
    #[argh(positional)]
    query: String,
}

/// Print the degree, modifier and quality lists
#[derive(FromArgs)]
#[argh(subcommand, name = "options")]
struct OptionsArgs {}

/// List approved progressions
#[derive(FromArgs)]
#[argh(subcommand, name = "list")]
struct ListArgs {
    /// search in titles and remarks
    #[argh(option)]
    query: Option<String>,

    /// search in chords, e.g. "IV V IIIm VIm"
    #[argh(option)]
    chord: Option<String>,
}

/// Show one approved progression
#[derive(FromArgs)]
#[argh(subcommand, name = "show")]
struct ShowArgs {
    /// progression id
    #[argh(positional)]
    id: Uuid,
}

/// Submit a new progression from a YAML draft
#[derive(FromArgs)]
#[argh(subcommand, name = "submit")]
struct SubmitArgs {
    /// YAML draft file
    #[argh(positional)]
    draft: String,

    /// address of the submitter
    #[argh(option)]
    ip: Option<String>,

    /// value of the X-Forwarded-For header
    #[argh(option)]
    forwarded_for: Option<String>,
}

/// Request an edit of an approved progression
#[derive(FromArgs)]
#[argh(subcommand, name = "edit")]
struct EditArgs {
    /// id of the approved progression
    #[argh(positional)]
    id: Uuid,

    /// YAML draft file
    #[argh(positional)]
    draft: String,

    /// address of the submitter
    #[argh(option)]
    ip: Option<String>,

    /// value of the X-Forwarded-For header
    #[argh(option)]
    forwarded_for: Option<String>,
}

/// Send feedback to the moderators
#[derive(FromArgs)]
#[argh(subcommand, name = "feedback")]
struct FeedbackArgs {
    /// feedback text
    #[argh(positional)]
    content: String,

    /// address of the sender
    #[argh(option)]
    ip: Option<String>,

    /// value of the X-Forwarded-For header
    #[argh(option)]
    forwarded_for: Option<String>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_draft(path: &str) -> Result<ProgressionDraft> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Only the commands that read or write the catalog need the config.
fn catalog_path(config: Option<&str>) -> Result<PathBuf> {
    Ok(Config::load(config.map(Path::new))?.catalog_path)
}

fn run(args: Args) -> Result<()> {
    let config = args.config.as_deref();

    match args.command {
        Command::Normalize(a) => {
            let chords: Vec<_> = a
                .chords
                .iter()
                .map(|c| {
                    let symbol = ChordSymbol::parse(c);
                    json!({
                        "input": c,
                        "normalized": normalize_chord(Some(c)),
                        "modifier": symbol.as_ref().map(|s| s.modifier.clone()),
                        "degree": symbol.as_ref().map(|s| s.degree.clone()),
                        "quality": symbol.as_ref().map(|s| s.quality.clone()),
                        "bass": symbol.as_ref().and_then(|s| s.bass.clone()),
                        "known_quality": symbol.as_ref().is_some_and(|s| s.has_known_quality()),
                    })
                })
                .collect();
            print_json(&chords)
        }
        Command::Query(a) => {
            println!("{}", normalize_search_query(Some(&a.query)));
            Ok(())
        }
        Command::Match(a) => {
            let matched = search_in_normalized(&a.normalized, &a.query);
            println!("{matched}");
            if !matched {
                std::process::exit(2);
            }
            Ok(())
        }
        Command::Options(_) => print_json(&chord_options()),
        Command::List(a) => {
            let catalog = Catalog::load(&catalog_path(config)?)?;
            print_json(&catalog.list_approved(a.query.as_deref(), a.chord.as_deref()))
        }
        Command::Show(a) => {
            let catalog = Catalog::load(&catalog_path(config)?)?;
            let progression = catalog.get_approved(a.id)?;
            let measures: Vec<_> = progression
                .patterns
                .iter()
                .map(|p| {
                    json!({
                        "label": p.label,
                        "measures": format_measures(&p.chords, SLOTS_PER_MEASURE),
                    })
                })
                .collect();
            let embeds: Vec<_> = progression
                .songs
                .iter()
                .map(|s| {
                    json!({
                        "name": s.name,
                        "youtube": s.youtube_embed_id(),
                        "spotify": s.spotify_embed_id(),
                    })
                })
                .collect();
            print_json(&json!({
                "progression": progression,
                "display": measures,
                "embeds": embeds,
            }))
        }
        Command::Submit(a) => {
            let path = catalog_path(config)?;
            let mut catalog = Catalog::load(&path)?;
            let ip = client_ip(a.forwarded_for.as_deref(), a.ip.as_deref());
            let progression = catalog.submit(read_draft(&a.draft)?, &ip)?;
            catalog.save(&path)?;
            print_json(&progression)
        }
        Command::Edit(a) => {
            let path = catalog_path(config)?;
            let mut catalog = Catalog::load(&path)?;
            let ip = client_ip(a.forwarded_for.as_deref(), a.ip.as_deref());
            let progression = catalog.request_edit(a.id, read_draft(&a.draft)?, &ip)?;
            catalog.save(&path)?;
            print_json(&progression)
        }
        Command::Feedback(a) => {
            let path = catalog_path(config)?;
            let mut catalog = Catalog::load(&path)?;
            let ip = client_ip(a.forwarded_for.as_deref(), a.ip.as_deref());
            let feedback = catalog.add_feedback(&a.content, &ip)?;
            catalog.save(&path)?;
            print_json(&feedback)
        }
    }
}

fn main() {
    logging::init_logging();
    let args: Args = argh::from_env();

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
