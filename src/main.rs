use clinic_schedule::{
    backend::DocumentStore,
    booking_desk::{BookingDesk, NewBooking},
    configuration::Configuration,
    configuration_handler::{Command, ConfigurationHandler},
    dev_server,
    local_documents::LocalDocuments,
    rest_client::RestClient,
    schedule::ScheduleSession,
    types::{BookingStatus, DateView, SlotState},
};
use futures::StreamExt;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    signal,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let configuration = ConfigurationHandler::parse_arguments();

    if let Command::Serve { days } = configuration.command() {
        let documents = LocalDocuments::default();
        documents.insert_example_schedule(*days)?;
        let address = format!("0.0.0.0:{}", configuration.port());
        let listener = tokio::net::TcpListener::bind(address).await?;
        dev_server::serve(documents, listener).await?;
        return Ok(());
    }

    let client = RestClient::new(
        &configuration.backend_url(),
        configuration.auth_token(),
        configuration.request_timeout(),
    )?;
    let session = ScheduleSession::open(client.clone(), configuration.flush_delay()).await?;
    execute(configuration.command(), client, session).await
}

/// Runs `command` and closes the session whatever its outcome, so toggles
/// applied before a failure are still saved.
async fn execute<S: DocumentStore>(
    command: &Command,
    store: S,
    mut session: ScheduleSession<S>,
) -> anyhow::Result<()> {
    let result = run_command(command, store, &mut session).await;
    let closed = session.close().await;
    result?;
    closed?;
    Ok(())
}

async fn run_command<S: DocumentStore>(
    command: &Command,
    store: S,
    session: &mut ScheduleSession<S>,
) -> anyhow::Result<()> {
    match command {
        Command::Show => print_view(&session.view()),
        Command::Toggle { date, times } => {
            for time in times {
                let available = session.toggle(date, time)?;
                println!("{date} {time} -> {}", open_or_closed(available));
            }
        }
        Command::Watch => watch(session).await?,
        Command::Book {
            date,
            time,
            name,
            phone,
        } => {
            let new_booking = NewBooking {
                date: date.clone(),
                time: time.clone(),
                name: name.clone(),
                phone: phone.clone(),
            };
            let booking = BookingDesk::new(store)
                .request(new_booking, &session.grid(), session.overlay())
                .await?;
            println!("Booked {} ({} {})", booking.id, booking.date, booking.time);
        }
        Command::Status { id, status } => {
            let status: BookingStatus = status.parse()?;
            let booking = BookingDesk::new(store).set_status(id, status).await?;
            println!("{} is now {}", booking.id, booking.status);
        }
        Command::Serve { .. } => {}
    }
    Ok(())
}

/// Applies toggles read from stdin until EOF. Ctrl-C stands in for the
/// page being hidden.
async fn watch<S: DocumentStore>(session: &mut ScheduleSession<S>) -> anyhow::Result<()> {
    let mut statuses = session.save_status_stream();
    let reporter = tokio::spawn(async move {
        while let Some(status) = statuses.next().await {
            info!(?status, "Save status");
        }
    });

    print_view(&session.view());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                session.page_hidden().await?;
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.split_whitespace().collect::<Vec<_>>().as_slice() {
                    ["toggle", date, time] => match session.toggle(date, time) {
                        Ok(available) => {
                            println!("{date} {time} -> {}", open_or_closed(available))
                        }
                        Err(err) => warn!(%err, "Toggle refused"),
                    },
                    ["show"] => print_view(&session.view()),
                    ["save"] => {
                        if let Err(err) = session.save_now().await {
                            warn!(%err, "Save failed, changes kept");
                        }
                    }
                    [] => {}
                    _ => println!("commands: toggle <date> <time> | show | save"),
                }
            }
        }
    }

    reporter.abort();
    Ok(())
}

fn open_or_closed(available: bool) -> &'static str {
    if available {
        "open"
    } else {
        "closed"
    }
}

fn print_view(view: &[DateView]) {
    for day in view {
        println!("{}", day.date);
        for slot in &day.slots {
            let state = match &slot.state {
                SlotState::Available => "open".to_string(),
                SlotState::Unavailable => "closed".to_string(),
                SlotState::Booked(booking) => {
                    format!("booked by {} ({})", booking.name, booking.status)
                }
            };
            let time = slot.display_time.as_deref().unwrap_or(&slot.time);
            println!("  {time:>8}  {state}");
        }
    }
}
