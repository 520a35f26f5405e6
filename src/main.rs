use clap::Parser;
use down_payment::api::{self, ApiRequest};
use down_payment::cli::{self, Cli, Command};
use down_payment::logging;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    logging::init_logger(args.verbose);

    match args.command {
        Command::Serve(serve) => {
            if let Err(e) = api::run_http_server(serve.into()).await {
                tracing::error!(error = %e, "server stopped");
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Command::Fixed(projection) => print_calculation(&projection.into_request(), args.json),
        Command::Stepped(stepped) => print_calculation(&stepped.into_request(), args.json),
        Command::Search(search) => print_calculation(&search.into_request(), args.json),
    }
}

fn print_calculation(request: &ApiRequest, json: bool) {
    match cli::render(request, json) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            tracing::debug!(?request, "calculation failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
