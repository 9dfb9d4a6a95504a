use std::time::Duration;

use zipdensity_core::batch::NullReporter;
use zipdensity_core::table::summary_lines;
use zipdensity_core::throttle::RateLimitConfig;
use zipdensity_core::{BatchJob, BatchProcessor, FetchError, RecordStatus, Table, aggregate};

use crate::common::{StubFetcher, density_page, table_page};

const INPUT: &str = "\
Store,zipCode,Region
Downtown,90210,West
Harbor,2134,East
Suburb,10001-1234,East
Closed,12,None
Lakeside,60601,Central
Airport,73301,South
Remote,99999,North
";

fn stub() -> StubFetcher {
    StubFetcher::new(vec![
        ("90210", Ok(density_page("Beverly Hills", "5,678.9"))),
        ("02134", Ok(table_page("21,000"))),
        ("10001-1234", Ok(density_page("New York", "98,765"))),
        ("60601", Err(FetchError::Network("connection reset by peer".into()))),
        ("73301", Ok("<html><body>Layout changed</body></html>".into())),
    ])
}

fn job(inputs: Vec<String>, concurrency: usize) -> BatchJob {
    BatchJob::new(inputs)
        .with_concurrency(concurrency)
        .unwrap()
        .with_rate_limit(RateLimitConfig::new(Duration::ZERO))
}

#[tokio::test]
async fn csv_batch_end_to_end() {
    let table = Table::from_csv_reader(INPUT.as_bytes()).unwrap();
    let inputs = table.zip_inputs().unwrap();
    let processor = BatchProcessor::new(stub());

    let result = processor.run(&job(inputs, 1), &NullReporter).await;
    let output = aggregate(&table, &result, true).unwrap();
    let csv = output.to_csv_string().unwrap();
    let lines: Vec<_> = csv.lines().collect();

    assert_eq!(lines[0], "Store,zipCode,Region,Full Text,Population Density");
    assert_eq!(
        lines[1],
        "Downtown,90210,West,\"Beverly Hills has a population density of 5,678.9 people per square mile.\",5678.9"
    );
    assert_eq!(
        lines[2],
        "Harbor,2134,East,\"Population Density: 21,000\",21000"
    );
    assert!(lines[4].ends_with(",Error: invalid zip code"));
    assert!(lines[5].starts_with("Lakeside,60601,Central,,Error: network error"));
    assert_eq!(lines[6], "Airport,73301,South,,Not Found");
    assert!(lines[7].contains("zip code not recognized by source"));
    assert_eq!(lines.len(), 8);
}

#[tokio::test]
async fn sequential_and_parallel_runs_agree() {
    let table = Table::from_csv_reader(INPUT.as_bytes()).unwrap();
    let inputs = table.zip_inputs().unwrap();

    let sequential = BatchProcessor::new(stub())
        .run(&job(inputs.clone(), 1), &NullReporter)
        .await;
    let parallel = BatchProcessor::new(stub())
        .run(&job(inputs.clone(), 5), &NullReporter)
        .await;

    assert_eq!(sequential.records.len(), inputs.len());
    assert_eq!(sequential.records, parallel.records);
    assert_eq!(sequential.summary, parallel.summary);

    let zips: Vec<_> = parallel.records.iter().map(|r| r.zipcode.clone()).collect();
    assert_eq!(
        zips,
        vec!["90210", "02134", "10001-1234", "12", "60601", "73301", "99999"]
    );
}

#[tokio::test]
async fn network_failure_is_isolated() {
    let table = Table::from_csv_reader(INPUT.as_bytes()).unwrap();
    let result = BatchProcessor::new(stub())
        .run(&job(table.zip_inputs().unwrap(), 3), &NullReporter)
        .await;

    assert!(matches!(result.records[4].status, RecordStatus::Error(_)));
    for (i, record) in result.records.iter().enumerate() {
        if i == 4 {
            continue;
        }
        assert!(
            matches!(
                record.status,
                RecordStatus::Found | RecordStatus::NotFound | RecordStatus::Error(_)
            ),
            "record {i} did not reach a terminal state"
        );
    }
    assert_eq!(result.records[0].status, RecordStatus::Found);
    assert_eq!(result.records[1].status, RecordStatus::Found);
    assert_eq!(result.records[2].status, RecordStatus::Found);
    assert_eq!(result.records[5].status, RecordStatus::NotFound);
}

#[tokio::test]
async fn summary_covers_every_row() {
    let table = Table::from_csv_reader(INPUT.as_bytes()).unwrap();
    let result = BatchProcessor::new(stub())
        .run(&job(table.zip_inputs().unwrap(), 2), &NullReporter)
        .await;

    let summary = result.summary;
    assert_eq!(summary.total, table.len());
    assert_eq!(summary.found, 3);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.error, 3);
    assert_eq!(summary.found + summary.not_found + summary.error, summary.total);
    assert_eq!(summary_lines(&summary)[1], "Found: 3 (42.9%)");
}

#[tokio::test]
async fn output_file_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");

    let table = Table::from_csv_reader(INPUT.as_bytes()).unwrap();
    let result = BatchProcessor::new(stub())
        .run(&job(table.zip_inputs().unwrap(), 1), &NullReporter)
        .await;
    let output = aggregate(&table, &result, false).unwrap();
    output
        .write_csv(std::fs::File::create(&path).unwrap())
        .unwrap();

    let reread = Table::from_csv_reader(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(reread, output);
    assert_eq!(reread.headers.last().map(String::as_str), Some("Population Density"));
    assert_eq!(reread.rows[0][3], "5678.9");
}
