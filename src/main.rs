// Solar Orbits - command line host

fn main() -> anyhow::Result<()> {
    solar_orbits_lib::run()?;
    Ok(())
}
