use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    pretrain_data::apps::run_create_pretrain_data(std::env::args().skip(1))
}
