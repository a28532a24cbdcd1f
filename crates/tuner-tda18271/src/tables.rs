//! Frequency lookup tables
//!
//! Every table is sorted by ascending upper bound. A lookup takes the first
//! entry whose bound is at or above the requested frequency; a frequency
//! above the last bound is out of range.

/// Synthesizer post-divider and divisor for frequencies up to `max_hz`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllEntry {
    pub max_hz: u32,
    pub postdiv: u8,
    pub div: u8,
}

const fn pll(max_hz: u32, postdiv: u8, div: u8) -> PllEntry {
    PllEntry { max_hz, postdiv, div }
}

/// One byte of chip data for frequencies up to the first field
pub type ByteEntry = (u32, u8);

/// Main synthesizer, first revision
pub const MAIN_PLL_V1: [PllEntry; 40] = [
    pll(32_000_000, 0x5F, 0xF0),
    pll(35_000_000, 0x5E, 0xE0),
    pll(37_000_000, 0x5D, 0xD0),
    pll(41_000_000, 0x5C, 0xC0),
    pll(44_000_000, 0x5B, 0xB0),
    pll(49_000_000, 0x5A, 0xA0),
    pll(54_000_000, 0x59, 0x90),
    pll(61_000_000, 0x58, 0x80),
    pll(65_000_000, 0x4F, 0x78),
    pll(70_000_000, 0x4E, 0x70),
    pll(75_000_000, 0x4D, 0x68),
    pll(82_000_000, 0x4C, 0x60),
    pll(89_000_000, 0x4B, 0x58),
    pll(98_000_000, 0x4A, 0x50),
    pll(109_000_000, 0x49, 0x48),
    pll(123_000_000, 0x48, 0x40),
    pll(131_000_000, 0x3F, 0x3C),
    pll(141_000_000, 0x3E, 0x38),
    pll(151_000_000, 0x3D, 0x34),
    pll(164_000_000, 0x3C, 0x30),
    pll(179_000_000, 0x3B, 0x2C),
    pll(197_000_000, 0x3A, 0x28),
    pll(219_000_000, 0x39, 0x24),
    pll(246_000_000, 0x38, 0x20),
    pll(263_000_000, 0x2F, 0x1E),
    pll(282_000_000, 0x2E, 0x1C),
    pll(303_000_000, 0x2D, 0x1A),
    pll(329_000_000, 0x2C, 0x18),
    pll(359_000_000, 0x2B, 0x16),
    pll(395_000_000, 0x2A, 0x14),
    pll(438_000_000, 0x29, 0x12),
    pll(493_000_000, 0x28, 0x10),
    pll(526_000_000, 0x1F, 0x0F),
    pll(564_000_000, 0x1E, 0x0E),
    pll(607_000_000, 0x1D, 0x0D),
    pll(658_000_000, 0x1C, 0x0C),
    pll(718_000_000, 0x1B, 0x0B),
    pll(790_000_000, 0x1A, 0x0A),
    pll(877_000_000, 0x19, 0x09),
    pll(987_000_000, 0x18, 0x08),
];

/// Main synthesizer, second revision
pub const MAIN_PLL_V2: [PllEntry; 40] = [
    pll(33_125_000, 0x57, 0xF0),
    pll(35_500_000, 0x56, 0xE0),
    pll(38_188_000, 0x55, 0xD0),
    pll(41_375_000, 0x54, 0xC0),
    pll(45_125_000, 0x53, 0xB0),
    pll(49_688_000, 0x52, 0xA0),
    pll(55_188_000, 0x51, 0x90),
    pll(62_125_000, 0x50, 0x80),
    pll(66_250_000, 0x47, 0x78),
    pll(71_000_000, 0x46, 0x70),
    pll(76_375_000, 0x45, 0x68),
    pll(82_750_000, 0x44, 0x60),
    pll(90_250_000, 0x43, 0x58),
    pll(99_375_000, 0x42, 0x50),
    pll(110_375_000, 0x41, 0x48),
    pll(124_250_000, 0x40, 0x40),
    pll(132_500_000, 0x37, 0x3C),
    pll(142_000_000, 0x36, 0x38),
    pll(152_750_000, 0x35, 0x34),
    pll(165_500_000, 0x34, 0x30),
    pll(180_500_000, 0x33, 0x2C),
    pll(198_750_000, 0x32, 0x28),
    pll(220_750_000, 0x31, 0x24),
    pll(248_500_000, 0x30, 0x20),
    pll(265_000_000, 0x27, 0x1E),
    pll(284_000_000, 0x26, 0x1C),
    pll(305_500_000, 0x25, 0x1A),
    pll(331_000_000, 0x24, 0x18),
    pll(361_000_000, 0x23, 0x16),
    pll(397_500_000, 0x22, 0x14),
    pll(441_500_000, 0x21, 0x12),
    pll(497_000_000, 0x20, 0x10),
    pll(530_000_000, 0x17, 0x0F),
    pll(568_000_000, 0x16, 0x0E),
    pll(611_000_000, 0x15, 0x0D),
    pll(662_000_000, 0x14, 0x0C),
    pll(722_000_000, 0x13, 0x0B),
    pll(795_000_000, 0x12, 0x0A),
    pll(883_000_000, 0x11, 0x09),
    pll(994_000_000, 0x10, 0x08),
];

/// Calibration synthesizer, first revision
pub const CAL_PLL_V1: [PllEntry; 35] = [
    pll(33_000_000, 0xDD, 0xD0),
    pll(36_000_000, 0xDC, 0xC0),
    pll(40_000_000, 0xDB, 0xB0),
    pll(44_000_000, 0xDA, 0xA0),
    pll(49_000_000, 0xD9, 0x90),
    pll(55_000_000, 0xD8, 0x80),
    pll(63_000_000, 0xD3, 0x70),
    pll(67_000_000, 0xCD, 0x68),
    pll(73_000_000, 0xCC, 0x60),
    pll(80_000_000, 0xCB, 0x58),
    pll(88_000_000, 0xCA, 0x50),
    pll(98_000_000, 0xC9, 0x48),
    pll(110_000_000, 0xC8, 0x40),
    pll(126_000_000, 0xC3, 0x38),
    pll(135_000_000, 0xBD, 0x34),
    pll(147_000_000, 0xBC, 0x30),
    pll(160_000_000, 0xBB, 0x2C),
    pll(176_000_000, 0xBA, 0x28),
    pll(196_000_000, 0xB9, 0x24),
    pll(220_000_000, 0xB8, 0x20),
    pll(252_000_000, 0xB3, 0x1C),
    pll(271_000_000, 0xAD, 0x1A),
    pll(294_000_000, 0xAC, 0x18),
    pll(321_000_000, 0xAB, 0x16),
    pll(353_000_000, 0xAA, 0x14),
    pll(392_000_000, 0xA9, 0x12),
    pll(441_000_000, 0xA8, 0x10),
    pll(505_000_000, 0xA3, 0x0E),
    pll(543_000_000, 0x9D, 0x0D),
    pll(589_000_000, 0x9C, 0x0C),
    pll(642_000_000, 0x9B, 0x0B),
    pll(707_000_000, 0x9A, 0x0A),
    pll(785_000_000, 0x99, 0x09),
    pll(883_000_000, 0x98, 0x08),
    pll(1_010_000_000, 0x93, 0x07),
];

/// Calibration synthesizer, second revision
pub const CAL_PLL_V2: [PllEntry; 34] = [
    pll(33_813_000, 0xDD, 0xD0),
    pll(36_625_000, 0xDC, 0xC0),
    pll(39_938_000, 0xDB, 0xB0),
    pll(43_938_000, 0xDA, 0xA0),
    pll(48_813_000, 0xD9, 0x90),
    pll(54_938_000, 0xD8, 0x80),
    pll(62_813_000, 0xD3, 0x70),
    pll(67_625_000, 0xCD, 0x68),
    pll(73_250_000, 0xCC, 0x60),
    pll(79_875_000, 0xCB, 0x58),
    pll(87_875_000, 0xCA, 0x50),
    pll(97_625_000, 0xC9, 0x48),
    pll(109_875_000, 0xC8, 0x40),
    pll(125_625_000, 0xC3, 0x38),
    pll(135_250_000, 0xBD, 0x34),
    pll(146_500_000, 0xBC, 0x30),
    pll(159_750_000, 0xBB, 0x2C),
    pll(175_750_000, 0xBA, 0x28),
    pll(195_250_000, 0xB9, 0x24),
    pll(219_750_000, 0xB8, 0x20),
    pll(251_250_000, 0xB3, 0x1C),
    pll(270_500_000, 0xAD, 0x1A),
    pll(293_000_000, 0xAC, 0x18),
    pll(319_500_000, 0xAB, 0x16),
    pll(351_500_000, 0xAA, 0x14),
    pll(390_500_000, 0xA9, 0x12),
    pll(439_500_000, 0xA8, 0x10),
    pll(502_500_000, 0xA3, 0x0E),
    pll(541_000_000, 0x9D, 0x0D),
    pll(586_000_000, 0x9C, 0x0C),
    pll(639_000_000, 0x9B, 0x0B),
    pll(703_000_000, 0x9A, 0x0A),
    pll(781_000_000, 0x99, 0x09),
    pll(879_000_000, 0x98, 0x08),
];

/// Factory RF tracking-filter capacitor codes, first revision
pub const RF_CAL_V1: [ByteEntry; 17] = [
    (41_000_000, 0x1E), (43_000_000, 0x30), (45_000_000, 0x43), (46_000_000, 0x4D),
    (47_000_000, 0x54), (47_900_000, 0x64), (49_100_000, 0x20), (50_000_000, 0x22),
    (51_000_000, 0x2A), (53_000_000, 0x32), (55_000_000, 0x35), (56_000_000, 0x3C),
    (57_000_000, 0x3F), (58_000_000, 0x48), (59_000_000, 0x4D), (60_000_000, 0x58),
    (61_100_000, 0x5F),
];

/// Factory RF tracking-filter capacitor codes, second revision
pub const RF_CAL_V2: [ByteEntry; 436] = [
    (41_000_000, 0x0F), (43_000_000, 0x1C), (45_000_000, 0x2F), (46_000_000, 0x39),
    (47_000_000, 0x40), (47_900_000, 0x50), (49_100_000, 0x16), (50_000_000, 0x18),
    (51_000_000, 0x20), (53_000_000, 0x28), (55_000_000, 0x2B), (56_000_000, 0x32),
    (57_000_000, 0x35), (58_000_000, 0x3E), (59_000_000, 0x43), (60_000_000, 0x4E),
    (61_100_000, 0x55), (63_000_000, 0x0F), (64_000_000, 0x11), (65_000_000, 0x12),
    (66_000_000, 0x15), (67_000_000, 0x16), (68_000_000, 0x17), (70_000_000, 0x19),
    (71_000_000, 0x1C), (72_000_000, 0x1D), (73_000_000, 0x1F), (74_000_000, 0x20),
    (75_000_000, 0x21), (76_000_000, 0x24), (77_000_000, 0x25), (78_000_000, 0x27),
    (80_000_000, 0x28), (81_000_000, 0x29), (82_000_000, 0x2D), (83_000_000, 0x2E),
    (84_000_000, 0x2F), (85_000_000, 0x31), (86_000_000, 0x33), (87_000_000, 0x34),
    (88_000_000, 0x35), (89_000_000, 0x37), (90_000_000, 0x38), (91_000_000, 0x39),
    (93_000_000, 0x3C), (94_000_000, 0x3E), (95_000_000, 0x3F), (96_000_000, 0x40),
    (97_000_000, 0x42), (99_000_000, 0x45), (100_000_000, 0x46), (102_000_000, 0x48),
    (103_000_000, 0x4A), (105_000_000, 0x4D), (106_000_000, 0x4E), (107_000_000, 0x50),
    (108_000_000, 0x51), (110_000_000, 0x54), (111_000_000, 0x56), (112_000_000, 0x57),
    (113_000_000, 0x58), (114_000_000, 0x59), (115_000_000, 0x5C), (116_000_000, 0x5D),
    (117_000_000, 0x5F), (119_000_000, 0x60), (120_000_000, 0x64), (121_000_000, 0x65),
    (122_000_000, 0x66), (123_000_000, 0x68), (124_000_000, 0x69), (125_000_000, 0x6C),
    (126_000_000, 0x6D), (127_000_000, 0x6E), (128_000_000, 0x70), (129_000_000, 0x71),
    (130_000_000, 0x75), (131_000_000, 0x77), (132_000_000, 0x78), (133_000_000, 0x7B),
    (134_000_000, 0x7E), (135_000_000, 0x81), (136_000_000, 0x82), (137_000_000, 0x87),
    (138_000_000, 0x88), (139_000_000, 0x8D), (140_000_000, 0x8E), (141_000_000, 0x91),
    (142_000_000, 0x95), (143_000_000, 0x9A), (144_000_000, 0x9D), (145_000_000, 0xA1),
    (146_000_000, 0xA2), (147_000_000, 0xA4), (148_000_000, 0xA9), (149_000_000, 0xAE),
    (150_000_000, 0xB0), (151_000_000, 0xB1), (152_000_000, 0xB7), (153_000_000, 0xBD),
    (154_000_000, 0x20), (155_000_000, 0x22), (156_000_000, 0x24), (157_000_000, 0x25),
    (158_000_000, 0x27), (159_000_000, 0x29), (160_000_000, 0x2C), (161_000_000, 0x2D),
    (163_000_000, 0x2E), (164_000_000, 0x2F), (165_000_000, 0x30), (166_000_000, 0x11),
    (167_000_000, 0x12), (168_000_000, 0x13), (169_000_000, 0x14), (170_000_000, 0x15),
    (172_000_000, 0x16), (173_000_000, 0x17), (174_000_000, 0x18), (175_000_000, 0x1A),
    (176_000_000, 0x1B), (178_000_000, 0x1D), (179_000_000, 0x1E), (180_000_000, 0x1F),
    (181_000_000, 0x20), (182_000_000, 0x21), (183_000_000, 0x22), (184_000_000, 0x24),
    (185_000_000, 0x25), (186_000_000, 0x26), (187_000_000, 0x27), (188_000_000, 0x29),
    (189_000_000, 0x2A), (190_000_000, 0x2C), (191_000_000, 0x2D), (192_000_000, 0x2E),
    (193_000_000, 0x2F), (194_000_000, 0x30), (195_000_000, 0x33), (196_000_000, 0x35),
    (198_000_000, 0x36), (200_000_000, 0x38), (201_000_000, 0x3C), (202_000_000, 0x3D),
    (203_500_000, 0x3E), (206_000_000, 0x0E), (208_000_000, 0x0F), (212_000_000, 0x10),
    (216_000_000, 0x11), (217_000_000, 0x12), (218_000_000, 0x13), (220_000_000, 0x14),
    (222_000_000, 0x15), (225_000_000, 0x16), (228_000_000, 0x17), (231_000_000, 0x18),
    (234_000_000, 0x19), (235_000_000, 0x1A), (236_000_000, 0x1B), (237_000_000, 0x1C),
    (240_000_000, 0x1D), (242_000_000, 0x1F), (247_000_000, 0x20), (249_000_000, 0x21),
    (252_000_000, 0x22), (253_000_000, 0x23), (254_000_000, 0x24), (256_000_000, 0x25),
    (259_000_000, 0x26), (262_000_000, 0x27), (264_000_000, 0x28), (267_000_000, 0x29),
    (269_000_000, 0x2A), (271_000_000, 0x2B), (273_000_000, 0x2C), (275_000_000, 0x2D),
    (277_000_000, 0x2E), (279_000_000, 0x2F), (282_000_000, 0x30), (284_000_000, 0x31),
    (286_000_000, 0x32), (287_000_000, 0x33), (290_000_000, 0x34), (293_000_000, 0x35),
    (295_000_000, 0x36), (297_000_000, 0x37), (300_000_000, 0x38), (303_000_000, 0x39),
    (305_000_000, 0x3A), (306_000_000, 0x3B), (307_000_000, 0x3C), (310_000_000, 0x3D),
    (312_000_000, 0x3E), (315_000_000, 0x3F), (318_000_000, 0x40), (320_000_000, 0x41),
    (323_000_000, 0x42), (324_000_000, 0x43), (325_000_000, 0x44), (327_000_000, 0x45),
    (331_000_000, 0x46), (334_000_000, 0x47), (337_000_000, 0x48), (339_000_000, 0x49),
    (340_000_000, 0x4A), (341_000_000, 0x4B), (343_000_000, 0x4C), (345_000_000, 0x4D),
    (349_000_000, 0x4E), (352_000_000, 0x4F), (353_000_000, 0x50), (355_000_000, 0x51),
    (357_000_000, 0x52), (359_000_000, 0x53), (361_000_000, 0x54), (362_000_000, 0x55),
    (364_000_000, 0x56), (368_000_000, 0x57), (370_000_000, 0x58), (372_000_000, 0x59),
    (375_000_000, 0x5A), (376_000_000, 0x5B), (377_000_000, 0x5C), (379_000_000, 0x5D),
    (382_000_000, 0x5E), (384_000_000, 0x5F), (385_000_000, 0x60), (386_000_000, 0x61),
    (388_000_000, 0x62), (390_000_000, 0x63), (393_000_000, 0x64), (394_000_000, 0x65),
    (396_000_000, 0x66), (397_000_000, 0x67), (398_000_000, 0x68), (400_000_000, 0x69),
    (402_000_000, 0x6A), (403_000_000, 0x6B), (407_000_000, 0x6C), (408_000_000, 0x6D),
    (409_000_000, 0x6E), (410_000_000, 0x6F), (411_000_000, 0x70), (412_000_000, 0x71),
    (413_000_000, 0x72), (414_000_000, 0x73), (417_000_000, 0x74), (418_000_000, 0x75),
    (420_000_000, 0x76), (422_000_000, 0x77), (423_000_000, 0x78), (424_000_000, 0x79),
    (427_000_000, 0x7A), (428_000_000, 0x7B), (429_000_000, 0x7D), (432_000_000, 0x7F),
    (434_000_000, 0x80), (435_000_000, 0x81), (436_000_000, 0x83), (437_000_000, 0x84),
    (438_000_000, 0x85), (439_000_000, 0x86), (440_000_000, 0x87), (441_000_000, 0x88),
    (442_000_000, 0x89), (445_000_000, 0x8A), (446_000_000, 0x8B), (447_000_000, 0x8C),
    (448_000_000, 0x8E), (449_000_000, 0x8F), (450_000_000, 0x90), (452_000_000, 0x91),
    (453_000_000, 0x93), (454_000_000, 0x94), (456_000_000, 0x96), (457_000_000, 0x98),
    (461_000_000, 0x11), (468_000_000, 0x12), (472_000_000, 0x13), (473_000_000, 0x14),
    (474_000_000, 0x15), (481_000_000, 0x16), (486_000_000, 0x17), (491_000_000, 0x18),
    (498_000_000, 0x19), (499_000_000, 0x1A), (501_000_000, 0x1B), (506_000_000, 0x1C),
    (511_000_000, 0x1D), (516_000_000, 0x1E), (520_000_000, 0x1F), (521_000_000, 0x20),
    (525_000_000, 0x21), (529_000_000, 0x22), (533_000_000, 0x23), (539_000_000, 0x24),
    (541_000_000, 0x25), (547_000_000, 0x26), (549_000_000, 0x27), (551_000_000, 0x28),
    (556_000_000, 0x29), (561_000_000, 0x2A), (563_000_000, 0x2B), (565_000_000, 0x2C),
    (569_000_000, 0x2D), (571_000_000, 0x2E), (577_000_000, 0x2F), (580_000_000, 0x30),
    (582_000_000, 0x31), (584_000_000, 0x32), (588_000_000, 0x33), (591_000_000, 0x34),
    (596_000_000, 0x35), (598_000_000, 0x36), (603_000_000, 0x37), (604_000_000, 0x38),
    (606_000_000, 0x39), (612_000_000, 0x3A), (615_000_000, 0x3B), (617_000_000, 0x3C),
    (621_000_000, 0x3D), (622_000_000, 0x3E), (625_000_000, 0x3F), (632_000_000, 0x40),
    (633_000_000, 0x41), (634_000_000, 0x42), (642_000_000, 0x43), (643_000_000, 0x44),
    (647_000_000, 0x45), (650_000_000, 0x46), (652_000_000, 0x47), (657_000_000, 0x48),
    (661_000_000, 0x49), (662_000_000, 0x4A), (665_000_000, 0x4B), (667_000_000, 0x4C),
    (670_000_000, 0x4D), (673_000_000, 0x4E), (676_000_000, 0x4F), (677_000_000, 0x50),
    (681_000_000, 0x51), (683_000_000, 0x52), (686_000_000, 0x53), (688_000_000, 0x54),
    (689_000_000, 0x55), (691_000_000, 0x56), (695_000_000, 0x57), (698_000_000, 0x58),
    (703_000_000, 0x59), (704_000_000, 0x5A), (705_000_000, 0x5B), (707_000_000, 0x5C),
    (710_000_000, 0x5D), (712_000_000, 0x5E), (717_000_000, 0x5F), (718_000_000, 0x60),
    (721_000_000, 0x61), (722_000_000, 0x62), (723_000_000, 0x63), (725_000_000, 0x64),
    (727_000_000, 0x65), (730_000_000, 0x66), (732_000_000, 0x67), (735_000_000, 0x68),
    (740_000_000, 0x69), (741_000_000, 0x6A), (742_000_000, 0x6B), (743_000_000, 0x6C),
    (745_000_000, 0x6D), (747_000_000, 0x6E), (748_000_000, 0x6F), (750_000_000, 0x70),
    (752_000_000, 0x71), (754_000_000, 0x72), (757_000_000, 0x73), (758_000_000, 0x74),
    (760_000_000, 0x75), (763_000_000, 0x76), (764_000_000, 0x77), (766_000_000, 0x78),
    (767_000_000, 0x79), (768_000_000, 0x7A), (773_000_000, 0x7B), (774_000_000, 0x7C),
    (776_000_000, 0x7D), (777_000_000, 0x7E), (778_000_000, 0x7F), (779_000_000, 0x80),
    (781_000_000, 0x81), (783_000_000, 0x82), (784_000_000, 0x83), (785_000_000, 0x84),
    (786_000_000, 0x85), (793_000_000, 0x86), (794_000_000, 0x87), (795_000_000, 0x88),
    (797_000_000, 0x89), (799_000_000, 0x8A), (801_000_000, 0x8B), (802_000_000, 0x8C),
    (803_000_000, 0x8D), (804_000_000, 0x8E), (810_000_000, 0x90), (811_000_000, 0x91),
    (812_000_000, 0x92), (814_000_000, 0x93), (816_000_000, 0x94), (817_000_000, 0x96),
    (818_000_000, 0x97), (820_000_000, 0x98), (821_000_000, 0x99), (822_000_000, 0x9A),
    (828_000_000, 0x9B), (829_000_000, 0x9D), (830_000_000, 0x9F), (831_000_000, 0xA0),
    (833_000_000, 0xA1), (835_000_000, 0xA2), (836_000_000, 0xA3), (837_000_000, 0xA4),
    (838_000_000, 0xA6), (840_000_000, 0xA8), (842_000_000, 0xA9), (845_000_000, 0xAA),
    (846_000_000, 0xAB), (847_000_000, 0xAD), (848_000_000, 0xAE), (852_000_000, 0xAF),
    (853_000_000, 0xB0), (858_000_000, 0xB1), (860_000_000, 0xB2), (861_000_000, 0xB3),
    (862_000_000, 0xB4), (863_000_000, 0xB6), (864_000_000, 0xB8), (865_000_000, 0xB9),
];

/// Gain taper codes
pub const GAIN_TAPER: [ByteEntry; 85] = [
    (45_400_000, 0x1F), (45_800_000, 0x1E), (46_200_000, 0x1D), (46_700_000, 0x1C),
    (47_100_000, 0x1B), (47_500_000, 0x1A), (47_900_000, 0x19), (49_600_000, 0x17),
    (51_200_000, 0x16), (52_900_000, 0x15), (54_500_000, 0x14), (56_200_000, 0x13),
    (57_800_000, 0x12), (59_500_000, 0x11), (61_100_000, 0x10), (67_600_000, 0x0D),
    (74_200_000, 0x0C), (80_700_000, 0x0B), (87_200_000, 0x0A), (93_800_000, 0x09),
    (100_300_000, 0x08), (106_900_000, 0x07), (113_400_000, 0x06), (119_900_000, 0x05),
    (126_500_000, 0x04), (133_000_000, 0x03), (139_500_000, 0x02), (146_100_000, 0x01),
    (152_600_000, 0x00), (154_300_000, 0x1F), (156_100_000, 0x1E), (157_800_000, 0x1D),
    (159_500_000, 0x1C), (161_200_000, 0x1B), (163_000_000, 0x1A), (164_700_000, 0x19),
    (170_200_000, 0x17), (175_800_000, 0x16), (181_300_000, 0x15), (186_900_000, 0x14),
    (192_400_000, 0x13), (198_000_000, 0x12), (203_500_000, 0x11), (216_200_000, 0x14),
    (228_900_000, 0x13), (241_600_000, 0x12), (254_400_000, 0x11), (267_100_000, 0x10),
    (279_800_000, 0x0F), (292_500_000, 0x0E), (305_200_000, 0x0D), (317_900_000, 0x0C),
    (330_700_000, 0x0B), (343_400_000, 0x0A), (356_100_000, 0x09), (368_800_000, 0x08),
    (381_500_000, 0x07), (394_200_000, 0x06), (406_900_000, 0x05), (419_700_000, 0x04),
    (432_400_000, 0x03), (445_100_000, 0x02), (457_800_000, 0x01), (476_300_000, 0x19),
    (494_800_000, 0x18), (513_300_000, 0x17), (531_800_000, 0x16), (550_300_000, 0x15),
    (568_900_000, 0x14), (587_400_000, 0x13), (605_900_000, 0x12), (624_400_000, 0x11),
    (642_900_000, 0x10), (661_400_000, 0x0F), (679_900_000, 0x0E), (698_400_000, 0x0D),
    (716_900_000, 0x0C), (735_400_000, 0x0B), (753_900_000, 0x0A), (772_500_000, 0x09),
    (791_000_000, 0x08), (809_500_000, 0x07), (828_000_000, 0x06), (846_500_000, 0x05),
    (865_000_000, 0x04),
];

/// RF calibration K/M codes, first revision
pub const RFC_KM_V1: [ByteEntry; 4] = [
    (61_100_000, 0x74), (350_000_000, 0x40), (720_000_000, 0x30), (865_000_000, 0x40),
];

/// RF calibration K/M codes, second revision
pub const RFC_KM_V2: [ByteEntry; 5] = [
    (47_900_000, 0x38), (61_100_000, 0x44), (350_000_000, 0x30), (720_000_000, 0x24),
    (865_000_000, 0x3C),
];

/// Per-frequency temperature coefficient of the capacitor code, in thousandths per degree
pub const RFC_TEMP_COEFF: [ByteEntry; 101] = [
    (47_900_000, 0x00), (55_000_000, 0x00), (61_100_000, 0x0A), (64_000_000, 0x0A),
    (82_000_000, 0x14), (84_000_000, 0x19), (119_000_000, 0x1C), (124_000_000, 0x20),
    (129_000_000, 0x2A), (134_000_000, 0x32), (139_000_000, 0x39), (144_000_000, 0x3E),
    (149_000_000, 0x3F), (152_600_000, 0x40), (154_000_000, 0x40), (164_700_000, 0x41),
    (203_500_000, 0x32), (353_000_000, 0x19), (356_000_000, 0x1A), (359_000_000, 0x1B),
    (363_000_000, 0x1C), (366_000_000, 0x1D), (369_000_000, 0x1E), (373_000_000, 0x1F),
    (376_000_000, 0x20), (379_000_000, 0x21), (383_000_000, 0x22), (386_000_000, 0x23),
    (389_000_000, 0x24), (393_000_000, 0x25), (396_000_000, 0x26), (399_000_000, 0x27),
    (402_000_000, 0x28), (404_000_000, 0x29), (407_000_000, 0x2A), (409_000_000, 0x2B),
    (412_000_000, 0x2C), (414_000_000, 0x2D), (417_000_000, 0x2E), (419_000_000, 0x2F),
    (422_000_000, 0x30), (424_000_000, 0x31), (427_000_000, 0x32), (429_000_000, 0x33),
    (432_000_000, 0x34), (434_000_000, 0x35), (437_000_000, 0x36), (439_000_000, 0x37),
    (442_000_000, 0x38), (444_000_000, 0x39), (447_000_000, 0x3A), (449_000_000, 0x3B),
    (457_800_000, 0x3C), (465_000_000, 0x0F), (477_000_000, 0x12), (483_000_000, 0x14),
    (502_000_000, 0x19), (508_000_000, 0x1B), (519_000_000, 0x1C), (522_000_000, 0x1D),
    (524_000_000, 0x1E), (534_000_000, 0x1F), (549_000_000, 0x20), (554_000_000, 0x22),
    (584_000_000, 0x24), (589_000_000, 0x26), (658_000_000, 0x27), (664_000_000, 0x2C),
    (669_000_000, 0x2D), (699_000_000, 0x2E), (704_000_000, 0x30), (709_000_000, 0x31),
    (714_000_000, 0x32), (724_000_000, 0x33), (729_000_000, 0x36), (739_000_000, 0x38),
    (744_000_000, 0x39), (749_000_000, 0x3B), (754_000_000, 0x3C), (759_000_000, 0x3D),
    (764_000_000, 0x3E), (769_000_000, 0x3F), (774_000_000, 0x40), (779_000_000, 0x41),
    (784_000_000, 0x43), (789_000_000, 0x46), (794_000_000, 0x48), (799_000_000, 0x4B),
    (804_000_000, 0x4F), (809_000_000, 0x54), (814_000_000, 0x59), (819_000_000, 0x5D),
    (824_000_000, 0x61), (829_000_000, 0x68), (834_000_000, 0x6E), (839_000_000, 0x75),
    (844_000_000, 0x7E), (849_000_000, 0x82), (854_000_000, 0x84), (859_000_000, 0x8F),
    (865_000_000, 0x9A),
];

/// RF sub-band with up to three calibration anchors (0 = unused)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfBand {
    pub max_hz: u32,
    pub anchors_hz: [u32; 3],
}

/// The seven RF tracking-filter sub-bands; the index is the band code
pub const RF_BANDS: [RfBand; 7] = [
    RfBand { max_hz: 47_900_000, anchors_hz: [46_000_000, 0, 0] },
    RfBand { max_hz: 61_100_000, anchors_hz: [52_200_000, 0, 0] },
    RfBand { max_hz: 152_600_000, anchors_hz: [70_100_000, 136_800_000, 0] },
    RfBand { max_hz: 164_700_000, anchors_hz: [156_700_000, 0, 0] },
    RfBand { max_hz: 203_500_000, anchors_hz: [186_250_000, 0, 0] },
    RfBand { max_hz: 457_800_000, anchors_hz: [230_000_000, 345_000_000, 426_000_000] },
    RfBand { max_hz: 865_000_000, anchors_hz: [489_500_000, 697_500_000, 842_000_000] },
];

/// Carrier-detect target and sweep budget (kHz either side) for a powerscan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidTarget {
    pub max_hz: u32,
    pub sweep_limit_khz: u32,
    pub target: u8,
}

pub const CID_TARGETS: [CidTarget; 12] = [
    CidTarget { max_hz: 46_000_000, sweep_limit_khz: 1800, target: 0x04 },
    CidTarget { max_hz: 52_200_000, sweep_limit_khz: 1500, target: 0x0A },
    CidTarget { max_hz: 70_100_000, sweep_limit_khz: 4000, target: 0x01 },
    CidTarget { max_hz: 136_800_000, sweep_limit_khz: 4000, target: 0x18 },
    CidTarget { max_hz: 156_700_000, sweep_limit_khz: 4000, target: 0x18 },
    CidTarget { max_hz: 186_250_000, sweep_limit_khz: 4000, target: 0x0A },
    CidTarget { max_hz: 230_000_000, sweep_limit_khz: 4000, target: 0x0A },
    CidTarget { max_hz: 345_000_000, sweep_limit_khz: 4000, target: 0x18 },
    CidTarget { max_hz: 426_000_000, sweep_limit_khz: 4000, target: 0x0E },
    CidTarget { max_hz: 489_500_000, sweep_limit_khz: 4000, target: 0x1E },
    CidTarget { max_hz: 697_500_000, sweep_limit_khz: 4000, target: 0x32 },
    CidTarget { max_hz: 842_000_000, sweep_limit_khz: 4000, target: 0x3A },
];

/// Band-pass filter upper bounds; the index is the filter code
pub const BP_FILTER: [u32; 7] = [
    62_000_000,
    84_000_000,
    100_000_000,
    140_000_000,
    170_000_000,
    180_000_000,
    865_000_000,
];

/// Image-rejection measurement codes
pub const IR_MEASURE: [ByteEntry; 3] = [(200_000_000, 0x05), (600_000_000, 0x06), (865_000_000, 0x07)];

/// Die temperature in °C by sensor code, for the low and high ranges
pub const THERMOMETER: [[u8; 2]; 16] = [
    [60, 92],
    [62, 94],
    [66, 98],
    [64, 96],
    [74, 106],
    [72, 104],
    [68, 100],
    [70, 102],
    [90, 122],
    [88, 120],
    [84, 116],
    [86, 118],
    [76, 108],
    [78, 110],
    [82, 114],
    [80, 112],
];

/// First PLL entry covering `frequency_hz`
pub fn pll_entry(table: &[PllEntry], frequency_hz: u32) -> Option<&PllEntry> {
    table.iter().find(|e| frequency_hz <= e.max_hz)
}

/// Byte stored for the first entry covering `frequency_hz`
pub fn byte_for(table: &[ByteEntry], frequency_hz: u32) -> Option<u8> {
    table
        .iter()
        .find(|(max_hz, _)| frequency_hz <= *max_hz)
        .map(|(_, value)| *value)
}

/// Index of the first bound covering `frequency_hz`
pub fn index_for(bounds: impl IntoIterator<Item = u32>, frequency_hz: u32) -> Option<usize> {
    bounds.into_iter().position(|max_hz| frequency_hz <= max_hz)
}
