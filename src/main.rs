use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;

use logtrail_fetch::{
    CacheService, FetchConfig, HttpTransport, LogClient, LogsOutcome, QueryParams,
};
use logtrail_logs::{
    DEFAULT_MAX_DEPTH, DEFAULT_PAGE_SIZE, DeliveryMode, FilterSpec, Normalizer, Pager,
    RecordSummary, VirtualWindow, apply, filter_options,
};
use logtrail_types::{LogRecord, sort_newest_first};

/// Logtrail - browse request/response logs from a remote service
#[derive(Parser, Debug)]
#[command(name = "logtrail")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the logs service
    #[arg(long, default_value = "")]
    base_url: String,

    /// Client identity sent with every request
    #[arg(long, default_value = "")]
    client_code: String,

    /// Access key sent with every request
    #[arg(long, default_value = "")]
    api_key: String,

    /// Default gateway for the outgoing query
    #[arg(long, default_value = "")]
    gateway: String,

    /// Server-side lower date bound (forwarded verbatim)
    #[arg(long)]
    start_date: Option<String>,

    /// Server-side upper date bound (forwarded verbatim)
    #[arg(long)]
    end_date: Option<String>,

    /// Case-insensitive substring filter over loaded records
    #[arg(long, default_value = "")]
    search: String,

    /// Exact gateway filter over loaded records
    #[arg(long, default_value = "")]
    filter_gateway: String,

    /// Exact api filter over loaded records
    #[arg(long, default_value = "")]
    filter_api: String,

    /// Exact status filter over loaded records
    #[arg(long, default_value = "")]
    filter_status: String,

    /// Client-side lower bound on created_at (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    date_from: Option<String>,

    /// Client-side upper bound on created_at (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    date_to: Option<String>,

    /// Zero-based page to show in paged delivery
    #[arg(long, default_value = "0")]
    page: usize,

    /// Records per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// First visible row in virtualized delivery
    #[arg(long, default_value = "0")]
    scroll: usize,

    /// Rows in the virtualized viewport
    #[arg(long, default_value = "20")]
    viewport: usize,

    /// Disable the response cache
    #[arg(long)]
    no_cache: bool,

    /// Invalidate the cache before fetching
    #[arg(long)]
    refresh: bool,

    /// Treat the transport as offline (serves the fallback dataset)
    #[arg(long)]
    offline: bool,

    /// List the distinct gateway/api/status values of the loaded set
    #[arg(long)]
    options: bool,

    /// Show the full decoded payloads of one record
    #[arg(long)]
    detail: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing for debugging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run_app(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run_app(args: Args) -> Result<()> {
    let config = FetchConfig {
        base_url: args.base_url.clone(),
        client_code: args.client_code.clone(),
        api_key: args.api_key.clone(),
        default_gateway: args.gateway.clone(),
        enable_cache: !args.no_cache,
        ..Default::default()
    };

    let cache = CacheService::new();
    // Background eviction for the lifetime of the process
    let sweeper = cache.spawn_sweeper(config.sweep_interval);

    let transport = HttpTransport::new(&config).context("Failed to build HTTP transport")?;
    let client = LogClient::new(transport, config, cache);

    if args.offline {
        client.set_online(false);
    }
    if args.refresh {
        client.clear_cache();
    }

    let query = QueryParams {
        start_date: args.start_date.clone(),
        end_date: args.end_date.clone(),
        gateway: None,
    };

    let outcome = client.get_logs(&query).await.context("Failed to fetch logs")?;
    if let LogsOutcome::Degraded { reason, .. } = &outcome {
        eprintln!("warning: live data unavailable ({}), showing fallback records", reason.label());
    }

    let mut records = outcome.into_records();
    sort_newest_first(&mut records);

    let spec = FilterSpec {
        search: args.search.clone(),
        gateway: args.filter_gateway.clone(),
        api: args.filter_api.clone(),
        status: args.filter_status.clone(),
        date_from: parse_bound(args.date_from.as_deref(), false)
            .context("Invalid --date-from")?,
        date_to: parse_bound(args.date_to.as_deref(), true).context("Invalid --date-to")?,
    };
    let filtered = apply(&records, &spec);

    if args.options {
        print_options(&filtered);
    } else if let Some(id) = args.detail {
        print_detail(&filtered, id)?;
    } else {
        print_window(&filtered, &args);
    }

    sweeper.cancel();
    Ok(())
}

/// Parse a date bound, accepting a bare date or a full RFC 3339 timestamp.
/// Bare dates expand to the start (lower bound) or end (upper bound) of day.
fn parse_bound(input: Option<&str>, end_of_day: bool) -> Result<Option<DateTime<Utc>>> {
    let Some(input) = input else {
        return Ok(None);
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("'{input}' is not a date"))?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    Ok(time.map(|naive| naive.and_utc()))
}

fn print_options(records: &[LogRecord]) {
    let options = filter_options(records);
    println!("gateways: {}", options.gateways.join(", "));
    println!("apis:     {}", options.apis.join(", "));
    println!("statuses: {}", options.statuses.join(", "));
}

fn print_detail(records: &[LogRecord], id: u64) -> Result<()> {
    let record = records
        .iter()
        .find(|r| r.id == id)
        .with_context(|| format!("No record with id {id} in the filtered set"))?;

    let summary = RecordSummary::extract(record);

    println!("id:         {}", record.id);
    println!("created_at: {}", record.created_at);
    println!("gateway:    {}", record.gateway);
    println!("api:        {}", record.api);
    println!("code:       {}", record.code.as_display());
    println!("session:    {}", record.session_id);
    println!("timer:      {:.1}ms", record.timer);
    if let Some(transaction) = &summary.transaction {
        println!("transaction: {transaction}");
    }
    if let Some(message) = &summary.message {
        println!("message:     {message}");
    }
    for url in &summary.attachments {
        println!("attachment:  {url}");
    }

    println!("\nrequest:");
    println!("{}", Normalizer::pretty(&Normalizer::decode(&record.request, DEFAULT_MAX_DEPTH)));
    println!("\nresponse:");
    println!("{}", Normalizer::pretty(&Normalizer::decode(&record.response, DEFAULT_MAX_DEPTH)));

    Ok(())
}

fn print_window(records: &[LogRecord], args: &Args) {
    let visible: &[LogRecord] = match DeliveryMode::for_len(records.len()) {
        DeliveryMode::Paged => {
            let mut pager = Pager::new(args.page_size);
            pager.set_page(args.page, records.len());
            println!(
                "{} records, page {}/{}",
                records.len(),
                pager.page() + 1,
                pager.total_pages(records.len())
            );
            pager.slice(records)
        }
        DeliveryMode::Virtualized => {
            let mut window = VirtualWindow::new(args.viewport);
            window.set_scroll(args.scroll, records.len());
            let (start, end) = window.visible_range(records.len());
            println!("{} records, rows {start}..{end}", records.len());
            window.slice(records)
        }
    };

    for record in visible {
        println!(
            "{:>8}  {:<20}  {:<10}  {:<14}  {:>6}  {:>9.1}ms",
            record.id,
            record.created_at,
            record.gateway,
            record.api,
            record.code.as_display(),
            record.timer,
        );
    }
}
