//! Synthetic Dataset Generator
//!
//! Writes a semicolon-delimited fuel price collection file for trying the
//! inference pipeline without real survey data.
//!
//! Usage: generate_dataset [output.csv] [rows] [invalid_date_rate]

use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::io::Write;
use tracing::info;

/// One collection record, using the survey's column names
#[derive(Debug, Serialize)]
struct Collection {
    #[serde(rename = "Regiao - Sigla")]
    region: &'static str,
    #[serde(rename = "Estado - Sigla")]
    state: &'static str,
    #[serde(rename = "Municipio")]
    city: &'static str,
    #[serde(rename = "Revenda")]
    station: String,
    #[serde(rename = "Produto")]
    product: &'static str,
    #[serde(rename = "Data da Coleta")]
    collected_on: String,
    #[serde(rename = "Valor de Venda")]
    sale_price: String,
    #[serde(rename = "Valor de Compra")]
    purchase_price: String,
    #[serde(rename = "Unidade de Medida")]
    unit: &'static str,
    #[serde(rename = "Bandeira")]
    brand: &'static str,
}

const LOCATIONS: [(&str, &str, &str); 8] = [
    ("SE", "SP", "SAO PAULO"),
    ("SE", "RJ", "RIO DE JANEIRO"),
    ("SE", "MG", "BELO HORIZONTE"),
    ("S", "PR", "CURITIBA"),
    ("S", "RS", "PORTO ALEGRE"),
    ("NE", "BA", "SALVADOR"),
    ("N", "AM", "MANAUS"),
    ("CO", "DF", "BRASILIA"),
];

const PRODUCTS: [(&str, f64); 4] = [
    ("GASOLINA", 5.4),
    ("GASOLINA ADITIVADA", 5.6),
    ("ETANOL", 3.9),
    ("DIESEL", 5.9),
];

const BRANDS: [&str; 5] = ["RAIZEN", "VIBRA ENERGIA", "IPIRANGA", "BRANCA", "ALESAT"];

struct CollectionGenerator {
    rng: rand::rngs::ThreadRng,
    first_day: NaiveDate,
    invalid_date_rate: f64,
}

impl CollectionGenerator {
    fn new(invalid_date_rate: f64) -> Self {
        Self {
            rng: rand::thread_rng(),
            first_day: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap_or_default(),
            invalid_date_rate,
        }
    }

    fn generate(&mut self) -> Collection {
        let (region, state, city) = *LOCATIONS.choose(&mut self.rng).unwrap_or(&LOCATIONS[0]);
        let (product, base_price) = *PRODUCTS.choose(&mut self.rng).unwrap_or(&PRODUCTS[0]);
        let brand = *BRANDS.choose(&mut self.rng).unwrap_or(&BRANDS[0]);

        let collected_on = if self.rng.gen_bool(self.invalid_date_rate) {
            "not a date".to_string()
        } else {
            let day = self.first_day + Duration::days(self.rng.gen_range(0..180));
            day.format("%d/%m/%Y").to_string()
        };

        let purchase = base_price * self.rng.gen_range(0.78..0.90);
        let sale = base_price + self.rng.gen_range(-0.35..0.35);

        // The survey often leaves the purchase price blank.
        let purchase_price = if self.rng.gen_bool(0.15) {
            String::new()
        } else {
            format!("{:.2}", purchase).replace('.', ",")
        };

        Collection {
            region,
            state,
            city,
            station: format!("POSTO {:04}", self.rng.gen_range(1..5000)),
            product,
            collected_on,
            sale_price: format!("{:.2}", sale).replace('.', ","),
            purchase_price,
            unit: "R$ / litro",
            brand,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generate_dataset=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let output = args.get(1).map(|s| s.as_str()).unwrap_or("-");
    let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1000);
    let invalid_date_rate: f64 = args
        .get(3)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.02)
        .clamp(0.0, 1.0);

    info!(
        output = %output,
        count = count,
        invalid_date_rate = invalid_date_rate,
        "Generating synthetic dataset"
    );

    let sink: Box<dyn Write> = if output == "-" {
        Box::new(std::io::stdout())
    } else {
        Box::new(std::fs::File::create(output)?)
    };

    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(sink);
    let mut generator = CollectionGenerator::new(invalid_date_rate);
    let mut gasoline = 0usize;

    for _ in 0..count {
        let record = generator.generate();
        if record.product == "GASOLINA" {
            gasoline += 1;
        }
        writer.serialize(&record)?;
    }
    writer.flush()?;

    info!(
        "Completed! Wrote {} rows ({} gasoline, {} other products)",
        count,
        gasoline,
        count - gasoline
    );

    Ok(())
}
