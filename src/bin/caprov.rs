use caprov::cli::options::Options;

#[tokio::main]
async fn main() {
    match Options::from_args().run().await {
        Ok(report) => {
            if !report.is_empty() {
                print!("{report}");
            }
        }
        Err(err) => {
            eprintln!("{err}");
            ::std::process::exit(1);
        }
    }
}
