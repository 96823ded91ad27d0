use super::EXIT_SUCCESS;

pub fn run(json: bool) -> u8 {
    let version = env!("CARGO_PKG_VERSION");
    if json {
        println!("{}", serde_json::json!({ "name": "mowerctl", "version": version }));
    } else {
        println!("mowerctl {version}");
    }
    EXIT_SUCCESS
}
