use crate::domain::{
    Address, Coordinate, FootTrafficCurve, Location, LocationKind, Plaza, SocioeconomicLevel,
};
use anyhow::Context;

type LocationRow = (String, String, f64, f64, String);

type PlazaRow = (
    String,
    String,
    f64,
    f64,
    String,
    String,
    Vec<i32>,
    String,
    String,
    String,
    Option<String>,
);

const PLAZA_SELECT: &str = "SELECT l.id, l.name, l.lat, l.lng, l.kind, \
     p.socioeconomic_level, p.hourly_traffic, p.street, p.neighborhood, p.municipality, p.postal_code \
     FROM plazas p JOIN locations l ON l.id = p.location_id";

/// Company locations already operating.
pub async fn load_network(pool: &sqlx::PgPool) -> anyhow::Result<Vec<Location>> {
    let rows = sqlx::query_as::<_, LocationRow>(
        "SELECT id, name, lat, lng, kind FROM locations WHERE kind = 'existing' ORDER BY id ASC",
    )
    .persistent(false)
    .fetch_all(pool)
    .await
    .context("select existing locations failed")?;

    rows.into_iter().map(location_from_row).collect()
}

pub async fn load_plazas(pool: &sqlx::PgPool) -> anyhow::Result<Vec<Plaza>> {
    let rows = sqlx::query_as::<_, PlazaRow>(&format!("{PLAZA_SELECT} ORDER BY l.id ASC"))
        .persistent(false)
        .fetch_all(pool)
        .await
        .context("select plazas failed")?;

    rows.into_iter().map(plaza_from_row).collect()
}

fn location_from_row((id, name, lat, lng, kind): LocationRow) -> anyhow::Result<Location> {
    let coordinate = Coordinate::new(lat, lng)
        .with_context(|| format!("invalid coordinate in DB for location {id}"))?;
    let kind = LocationKind::parse(&kind)
        .with_context(|| format!("unknown location kind {kind:?} in DB for location {id}"))?;
    Ok(Location {
        id,
        name,
        coordinate,
        kind,
    })
}

fn plaza_from_row(row: PlazaRow) -> anyhow::Result<Plaza> {
    let (id, name, lat, lng, kind, level, hourly, street, neighborhood, municipality, postal_code) =
        row;
    let location = location_from_row((id, name, lat, lng, kind))?;

    let socioeconomic_level = SocioeconomicLevel::parse(&level).with_context(|| {
        format!(
            "unknown socioeconomic level {level:?} in DB for plaza {}",
            location.id
        )
    })?;

    Ok(Plaza {
        foot_traffic: curve_from_db(&location.id, &hourly)?,
        location,
        socioeconomic_level,
        address: Address {
            street,
            neighborhood,
            municipality,
            postal_code,
        },
    })
}

fn curve_from_db(plaza_id: &str, hourly: &[i32]) -> anyhow::Result<FootTrafficCurve> {
    anyhow::ensure!(
        hourly.len() == 24,
        "hourly_traffic must have 24 entries for plaza {plaza_id} (got {})",
        hourly.len()
    );

    let mut curve = FootTrafficCurve::default();
    for (slot, &v) in curve.hourly.iter_mut().zip(hourly) {
        *slot = u32::try_from(v)
            .with_context(|| format!("negative hourly traffic in DB for plaza {plaza_id}"))?;
    }
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_plaza_row() {
        let row: PlazaRow = (
            "plz-cumbres".to_string(),
            "Plaza Cumbres".to_string(),
            25.7318,
            -100.4027,
            "proposed".to_string(),
            "C+".to_string(),
            vec![10; 24],
            "Av. Paseo de los Leones 1000".to_string(),
            "Cumbres".to_string(),
            "Monterrey".to_string(),
            None,
        );

        let plaza = plaza_from_row(row).unwrap();
        assert_eq!(plaza.location.kind, LocationKind::Proposed);
        assert_eq!(plaza.socioeconomic_level, SocioeconomicLevel::CPlus);
        assert_eq!(plaza.foot_traffic.daily_total(), 240);
        assert_eq!(plaza.address.neighborhood, "Cumbres");
    }

    #[test]
    fn rejects_malformed_rows() {
        assert!(curve_from_db("p", &[1, 2, 3]).is_err());
        let mut negative = vec![0; 24];
        negative[5] = -1;
        assert!(curve_from_db("p", &negative).is_err());

        let bad_kind = (
            "x".to_string(),
            "X".to_string(),
            25.0,
            -100.0,
            "closed".to_string(),
        );
        assert!(location_from_row(bad_kind).is_err());
    }
}
