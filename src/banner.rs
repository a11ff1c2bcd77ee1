// src/banner.rs

/// Prints the application startup banner to the console.
pub fn print_banner() {
    let banner = r#"
   _     _           _
  (_)___(_)_  _  __| | __ _  ___
  | / __| | | | |/ _` |/ _` |/ _ \
  | \__ \ | |_| | (_| | (_| |  __/
 _/ |___/ |\__,_|\__,_|\__, |\___|
|__/   |__/            |___/

    Sandboxed JavaScript Solution Checker
"#;
    println!("{}", banner);
}
