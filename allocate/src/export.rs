use std::collections::HashSet;
use std::io::Write;

use allocation::{Assignment, Project, Resource};
use itertools::Itertools;

use crate::Result;

/// Writes `assignment` as a resource-by-project CSV table.
///
/// The header reads `Resource`, the project names sorted alphabetically, and `Row Sum`. Each
/// distinct resource ID gets one row, in the order it first appears in `resources`, followed by
/// a final `Column Sum` row. Projects that received nothing are listed with zeros.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn write_csv<W: Write>(
    writer: W,
    resources: &[Resource],
    projects: &[Project],
    assignment: &Assignment,
) -> Result<()> {
    let projects: Vec<_> = projects.iter().sorted_by_key(|p| p.name()).collect();
    let mut seen = HashSet::new();
    let resource_ids: Vec<_> = resources
        .iter()
        .map(Resource::id)
        .filter(|id| seen.insert(*id))
        .collect();

    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(
        std::iter::once("Resource")
            .chain(projects.iter().map(|p| p.name()))
            .chain(std::iter::once("Row Sum")),
    )?;

    let mut column_sums = vec![0_u64; projects.len()];
    for resource in resource_ids {
        let row: Vec<u64> = projects
            .iter()
            .map(|p| assignment.get(p.id()).map_or(0, |a| a.allocated(resource)))
            .collect();
        for (sum, &value) in column_sums.iter_mut().zip(&row) {
            *sum = sum.saturating_add(value);
        }
        let row_sum = row.iter().copied().fold(0, u64::saturating_add);
        writer.write_record(
            std::iter::once(resource.to_string())
                .chain(row.iter().map(u64::to_string))
                .chain(std::iter::once(row_sum.to_string())),
        )?;
    }

    let total = column_sums.iter().copied().fold(0, u64::saturating_add);
    writer.write_record(
        std::iter::once(String::from("Column Sum"))
            .chain(column_sums.iter().map(u64::to_string))
            .chain(std::iter::once(total.to_string())),
    )?;
    writer.flush()?;
    Ok(())
}
