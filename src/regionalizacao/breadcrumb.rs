//! General-to-specific navigation path of a filter set

use miette::Result;

use crate::core::config::Settings;
use crate::core::nav::Crumb;
use crate::core::store::{PlaceQuery, Store};

use super::filters::PlaceParams;

/// Build the breadcrumb of `params`
///
/// Filters are peeled from the most specific one; each entry points at the
/// filter set as it was before its filter was removed. The root entry points
/// at whatever remains (year, rede).
pub fn build(store: &Store, settings: &Settings, params: &PlaceParams) -> Result<Vec<Crumb>> {
    let mut current = params.clone();
    let mut crumbs = Vec::new();

    if let Some(escola) = current.escola.clone() {
        let query = PlaceQuery::new().escola(Some(escola.clone())).year(current.year);
        let name = store
            .escola_infos(&query)?
            .first()
            .map(|info| info.display_name())
            .unwrap_or(escola);
        crumbs.push(Crumb { name, url: current.url(settings) });
        current.escola = None;
    }

    if let Some(distrito) = current.distrito {
        let name = store
            .distrito(distrito)?
            .map(|d| d.name)
            .unwrap_or_else(|| distrito.to_string());
        crumbs.push(Crumb { name, url: current.url(settings) });
        current.distrito = None;
    }

    if let Some(dre) = current.dre.clone() {
        let name = store.dre(&dre)?.map(|d| d.name).unwrap_or(dre);
        crumbs.push(Crumb { name, url: current.url(settings) });
        current.dre = None;
    }

    if let Some(zona) = current.zona.clone() {
        crumbs.push(Crumb { name: zona, url: current.url(settings) });
        current.zona = None;
    }

    crumbs.push(Crumb {
        name: settings.root_label.clone(),
        url: current.url(settings),
    });

    crumbs.reverse();
    Ok(crumbs)
}
