use std::collections::BTreeMap;

use anyhow::Result;
use dballoc_core::AllocatorContext;

use super::OutputContext;

pub fn execute(ctx: &AllocatorContext, output: &OutputContext) -> Result<()> {
    let props = ctx.properties();
    if output.json {
        let shown: BTreeMap<&str, &str> = props.masked().collect();
        return output.print_json(&shown);
    }

    if props.is_empty() {
        output.print_info("No properties set");
        return Ok(());
    }
    println!("Effective Configuration");
    println!("=======================");
    for (key, value) in props.masked() {
        println!("{} = {}", key, value);
    }
    Ok(())
}
