//! `charmops missing-tracks`: report bundle tracks not yet on Charmhub.

use charmops_core::bundle::Bundle;
use charmops_core::tracks::{channel_maps, missing_track_summary, missing_tracks, CharmInfo, Juju};

use super::fail;

pub async fn run(bundle: &str) -> Result<(), String> {
    let bundle = Bundle::from_file(bundle).map_err(fail)?;
    let summary = report(&Juju::default(), &bundle).await;
    println!("{}", summary);
    Ok(())
}

/// The printed summary for `bundle`, with channel maps from `info`.
pub async fn report<I: CharmInfo>(info: &I, bundle: &Bundle) -> String {
    let maps = channel_maps(info, bundle).await;
    missing_track_summary(&missing_tracks(&bundle.applications, &maps))
}
