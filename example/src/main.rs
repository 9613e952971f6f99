mod catalog;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use comfy_table::Table;
use serde_json::json;
use super_masonry::{
    Columns, ConditionValue, Masonry, MasonryEvent, MasonryOptions, MatchMode, PackMode,
    SearchCondition, TransitionEffect,
    headless::{HeadlessHost, HeadlessItem},
    item::ItemHandle,
    px::Px,
};
use tracing::{info, warn};

use crate::catalog::Product;

/// Upper bound on frames pumped per step; a settled grid needs one or two.
const MAX_FRAMES: usize = 16;

#[derive(Parser)]
#[command(name = "masonry-demo")]
#[command(version, about = "Lay out a sample catalog with super-masonry, headlessly", long_about = None)]
struct Cli {
    /// Container width in pixels
    #[arg(short, long, default_value_t = 900.0)]
    width: f32,
    /// Number of generated items
    #[arg(short = 'n', long, default_value_t = 24)]
    items: usize,
    /// Seed for the sample catalog
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Fixed column count (auto when omitted)
    #[arg(short, long)]
    columns: Option<usize>,
    /// Column width hint used in auto mode
    #[arg(long, default_value_t = 200.0)]
    column_width: f32,
    /// Gutter applied on both axes
    #[arg(short, long, default_value_t = 10.0)]
    gutter: f32,
    /// Lay columns out from the right edge
    #[arg(long)]
    right_to_left: bool,
    /// Only show items priced at least this much
    #[arg(long)]
    min_price: Option<f64>,
    /// Only show items priced at most this much
    #[arg(long)]
    max_price: Option<f64>,
    /// Only show items whose title contains this text
    #[arg(long)]
    title_contains: Option<String>,
    /// Sort order
    #[arg(long, value_enum, default_value_t = SortOrder::None)]
    sort: SortOrder,
    /// Resize the container to these widths after the first pass
    #[arg(long, value_delimiter = ',')]
    resize: Vec<f32>,
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortOrder {
    None,
    PriceAsc,
    PriceDesc,
    Title,
}

fn init_tracing() {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match tracing_subscriber::EnvFilter::try_new("error,super_masonry=info") {
            Ok(filter) => filter,
            Err(_) => tracing_subscriber::EnvFilter::new("error"),
        },
    };

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn build_options(cli: &Cli) -> Result<MasonryOptions<Product>> {
    if let (Some(min), Some(max)) = (cli.min_price, cli.max_price)
        && min > max
    {
        bail!("--min-price ({min}) is greater than --max-price ({max})");
    }

    let mut conditions = Vec::new();
    if cli.min_price.is_some() || cli.max_price.is_some() {
        conditions.push(SearchCondition::new(
            "price",
            ConditionValue::Range(
                cli.min_price.unwrap_or(f64::NEG_INFINITY),
                cli.max_price.unwrap_or(f64::INFINITY),
            ),
            MatchMode::Range,
        ));
    }
    if let Some(text) = &cli.title_contains {
        conditions.push(SearchCondition::new(
            "title",
            ConditionValue::text(text.clone()),
            MatchMode::Contains,
        ));
    }

    let options = MasonryOptions::default()
        .columns(cli.columns.map_or(Columns::Auto, Columns::Fixed))
        .column_width(Px::new(cli.column_width))
        .gutter_x(Px::new(cli.gutter))
        .gutter_y(Px::new(cli.gutter))
        .origin_left(!cli.right_to_left)
        .pack(PackMode::Justified)
        .transition_effect(TransitionEffect::Fade)
        .search_conditions(conditions);

    Ok(match cli.sort {
        SortOrder::None => options,
        SortOrder::PriceAsc => options.sort_by(|a: &Product, b: &Product| a.price.total_cmp(&b.price)),
        SortOrder::PriceDesc => {
            options.sort_by(|a: &Product, b: &Product| b.price.total_cmp(&a.price))
        }
        SortOrder::Title => options.sort_by(|a: &Product, b: &Product| a.title.cmp(&b.title)),
    })
}

fn pump(host: &HeadlessHost) -> Result<()> {
    let frames = host.scheduler.run_until_idle(MAX_FRAMES);
    if host.scheduler.pending_frames() > 0 {
        bail!("grid did not settle within {frames} frames");
    }
    Ok(())
}

fn report(
    masonry: &Masonry<HeadlessItem<Product>>,
    items: &[Arc<HeadlessItem<Product>>],
    json: bool,
) -> Result<()> {
    let layout = masonry
        .last_layout()
        .context("no layout pass completed")?;
    let visible = masonry.visible_items();
    let placed: Vec<_> = visible
        .iter()
        .filter_map(|key| items.iter().find(|item| item.key() == *key))
        .filter_map(|item| item.position().map(|position| (item, position)))
        .collect();

    if json {
        let rows: Vec<_> = placed
            .iter()
            .map(|(item, position)| {
                json!({
                    "key": item.key(),
                    "title": item.data().title,
                    "category": item.data().category,
                    "price": item.data().price,
                    "x": position.x,
                    "y": position.y,
                    "width": item.style().width,
                })
            })
            .collect();
        let output = json!({ "layout": layout, "items": rows });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["key", "title", "category", "price", "x", "y", "width"]);
    for (item, position) in &placed {
        let width = item.style().width.unwrap_or(Px::ZERO);
        table.add_row(vec![
            item.key().0.to_string(),
            item.data().title.clone(),
            item.data().category.to_string(),
            format!("{:.0}", item.data().price),
            position.x.to_string(),
            position.y.to_string(),
            width.to_string(),
        ]);
    }
    println!("{table}");
    println!(
        "{} of {} items in {} columns, {} x {}, {:?}",
        layout.item_count,
        items.len(),
        layout.columns,
        layout.container_width,
        layout.container_height,
        layout.duration
    );
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let host = HeadlessHost::new(cli.width);
    let masonry = Masonry::new(host.environment(), build_options(&cli)?);
    masonry.subscribe(|event| match event {
        MasonryEvent::LayoutComplete(layout) => info!(
            columns = layout.columns,
            items = layout.item_count,
            height = %layout.container_height,
            "layout complete"
        ),
        MasonryEvent::ItemsFiltered(keys) => info!(visible = keys.len(), "items filtered"),
        MasonryEvent::Error(err) => warn!("layout failed: {err}"),
        _ => {}
    });

    let items = catalog::generate(cli.items, cli.seed);
    masonry.set_items(items.clone());
    masonry.start();
    pump(&host)?;
    report(&masonry, &items, cli.json)?;

    for width in &cli.resize {
        info!(width, "resizing container");
        host.resize(*width);
        pump(&host)?;
        report(&masonry, &items, cli.json)?;
    }

    masonry.stop();
    Ok(())
}
