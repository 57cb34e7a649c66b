mod common;

use chuk_grid::io;
use chuk_grid::mask::{
    combine_masks_and, combine_masks_or, create_mask, create_mask_from_dataset, mask_dataset,
    not_mask, CategoryMask,
};
use chuk_grid::check;
use common::{land_cover_dataset, small_grid};
use tempfile::TempDir;

#[test]
fn test_mask_from_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("aux.nc");
    let grid = small_grid();
    io::save(&land_cover_dataset(&grid), &path).unwrap();

    let woods = create_mask(&path, "land_cover", &["*woodland"], false).unwrap();
    assert_eq!(woods.count(), 11);

    let with_missing = create_mask(&path, "land_cover", &["*woodland"], true).unwrap();
    assert_eq!(with_missing.count(), 12);

    let mut category = CategoryMask::open(&path, "land_cover").unwrap();
    assert_eq!(category.all_mask_values().len(), 4);
    assert!(category.add_mask_value("urban").is_err());
}

#[test]
fn test_combinations() {
    let grid = small_grid();
    let ds = land_cover_dataset(&grid);
    let arable = create_mask_from_dataset(&ds, "land_cover", &["arable"], false).unwrap();
    let water = create_mask_from_dataset(&ds, "land_cover", &["water"], false).unwrap();
    let woods = create_mask_from_dataset(&ds, "land_cover", &["*woodland"], false).unwrap();

    let open_ground = combine_masks_or(vec![arable.clone(), water.clone()]).unwrap();
    assert_eq!(open_ground.count(), 12);
    assert_eq!(
        combine_masks_or(vec![water.clone(), arable.clone()])
            .unwrap()
            .to_array(),
        open_ground.to_array()
    );

    let nothing = combine_masks_and(vec![arable, water]).unwrap();
    assert_eq!(nothing.count(), 0);

    // the missing cell is outside every category mask, so it is inside the complement
    let not_woods = not_mask(woods);
    assert_eq!(not_woods.count(), 13);
    assert!((not_woods.fraction() - 13.0 / 24.0).abs() < 1e-12);
}

#[test]
fn test_mask_dataset_is_valid_chuk() {
    let tmp = TempDir::new().unwrap();
    let grid = small_grid();
    let ds = land_cover_dataset(&grid);
    let water = create_mask_from_dataset(&ds, "land_cover", &["water"], false).unwrap();

    let out = mask_dataset(&water, &grid, "water").unwrap();
    assert!(check(&out, &grid).errors.is_empty());

    let path = tmp.path().join("water.nc");
    io::save(&out, &path).unwrap();
    let back = io::read_netcdf(&path).unwrap();
    let values = back.require("water").unwrap().as_grid().unwrap().to_owned();
    assert_eq!(values.iter().filter(|v| **v == 1.0).count(), 6);
}
