//! `unison tools`: list built-in tools.

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let registry = unison_tools::default_registry();

    if json {
        let schemas: Vec<_> = registry
            .names()
            .into_iter()
            .filter_map(|name| registry.get(name))
            .map(|tool| tool.schema())
            .collect();
        println!("{}", serde_json::to_string_pretty(&schemas)?);
        return Ok(());
    }

    println!("Built-in tools ({}):", registry.len());
    println!("{}", registry.describe());
    Ok(())
}
